use metrics::{counter, histogram, Counter, Histogram};

/// 通知引擎指标
///
/// 未安装 recorder 时所有记录都是空操作，测试中可以直接构造。
#[derive(Clone)]
pub struct MetricsCollector {
    // Dispatch metrics
    notifications_raised_total: Counter,
    notifications_failed_total: Counter,
    notifications_skipped_total: Counter,
    dispatch_duration: Histogram,

    // Scheduler metrics
    ticks_total: Counter,
    tick_duration: Histogram,
    due_notifications: Histogram,
    due_query_failures_total: Counter,

    // Recovery metrics
    stale_claims_released_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            notifications_raised_total: counter!("crm_notifications_raised_total"),
            notifications_failed_total: counter!("crm_notifications_failed_total"),
            notifications_skipped_total: counter!("crm_notifications_skipped_total"),
            dispatch_duration: histogram!("crm_dispatch_duration_seconds"),
            ticks_total: counter!("crm_scheduler_ticks_total"),
            tick_duration: histogram!("crm_scheduler_tick_duration_seconds"),
            due_notifications: histogram!("crm_scheduler_due_notifications"),
            due_query_failures_total: counter!("crm_scheduler_due_query_failures_total"),
            stale_claims_released_total: counter!("crm_stale_claims_released_total"),
        }
    }

    pub fn record_notification_raised(&self, duration_seconds: f64) {
        self.notifications_raised_total.increment(1);
        self.dispatch_duration.record(duration_seconds);
    }

    pub fn record_notification_failed(&self, duration_seconds: f64) {
        self.notifications_failed_total.increment(1);
        self.dispatch_duration.record(duration_seconds);
    }

    pub fn record_notification_skipped(&self) {
        self.notifications_skipped_total.increment(1);
    }

    pub fn record_tick(&self, due_count: usize, duration_seconds: f64) {
        self.ticks_total.increment(1);
        self.due_notifications.record(due_count as f64);
        self.tick_duration.record(duration_seconds);
    }

    pub fn record_due_query_failure(&self) {
        self.due_query_failures_total.increment(1);
    }

    pub fn record_stale_claims_released(&self, released: u64) {
        self.stale_claims_released_total.increment(released);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
