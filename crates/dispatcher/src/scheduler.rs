use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use crm_config::SchedulerConfig;
use crm_domain::repositories::NotificationRepository;
use crm_observability::{MetricsCollector, StructuredLogger};
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatchOutcome, NotificationDispatcher};
use crate::recovery_service::ClaimRecoveryService;

/// 一次 tick 的执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 到期查询返回的通知数
    pub due: usize,
    /// 本次新启动的分发任务数
    pub launched: usize,
    /// 已有分发任务在处理、本次没有重复启动的通知数
    pub already_in_flight: usize,
    /// 回收的超时认领数
    pub reclaimed: u64,
    pub query_failed: bool,
}

/// 在飞通知 id 的登记，任务结束或被中止时自动移除
struct InFlightGuard {
    ids: Arc<StdMutex<HashSet<i64>>>,
    id: i64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.remove(&self.id);
        }
    }
}

/// 通知调度器
///
/// 按固定间隔查询到期通知，每条通知在独立的 tokio 任务中分发。
/// 启动分发不会阻塞 tick，实际执行受信号量限制。
pub struct NotificationScheduler {
    notification_repo: Arc<dyn NotificationRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    recovery: Option<ClaimRecoveryService>,
    config: SchedulerConfig,
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<DispatchOutcome>>,
    in_flight_ids: Arc<StdMutex<HashSet<i64>>>,
    metrics: Arc<MetricsCollector>,
}

impl NotificationScheduler {
    pub fn new(
        notification_repo: Arc<dyn NotificationRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        config: SchedulerConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let recovery = config.claim_timeout_seconds.map(|timeout| {
            ClaimRecoveryService::new(notification_repo.clone(), timeout, metrics.clone())
        });

        Self {
            notification_repo,
            dispatcher,
            recovery,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_dispatches)),
            config,
            tasks: Mutex::new(JoinSet::new()),
            in_flight_ids: Arc::new(StdMutex::new(HashSet::new())),
            metrics,
        }
    }

    /// 当前尚未结束的分发任务数
    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// 执行一次调度：回收超时认领、查询到期通知并为每条通知启动分发任务
    pub async fn tick(&self) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport::default();

        Self::reap_finished(&mut *self.tasks.lock().await);

        let now = Utc::now();

        if let Some(recovery) = &self.recovery {
            match recovery.reclaim_stale(now).await {
                Ok(released) => report.reclaimed = released,
                Err(e) => warn!("回收超时认领失败: {}", e),
            }
        }

        let due = match self.notification_repo.get_due(now).await {
            Ok(due) => due,
            Err(e) => {
                StructuredLogger::log_due_query_failed(&e.to_string());
                self.metrics.record_due_query_failure();
                report.query_failed = true;
                return report;
            }
        };
        report.due = due.len();

        // 只在启动任务时持锁，存储查询期间 in_flight 和 drain 不被阻塞
        let mut tasks = self.tasks.lock().await;
        if self.semaphore.is_closed() {
            debug!("调度器正在关闭，本次 tick 不再启动分发");
            return report;
        }
        for notification in due {
            let guard = {
                let mut ids = match self.in_flight_ids.lock() {
                    Ok(ids) => ids,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if !ids.insert(notification.id) {
                    report.already_in_flight += 1;
                    continue;
                }
                InFlightGuard {
                    ids: self.in_flight_ids.clone(),
                    id: notification.id,
                }
            };

            let dispatcher = self.dispatcher.clone();
            let semaphore = self.semaphore.clone();
            tasks.spawn(async move {
                let _guard = guard;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    // 信号量只会在关闭时被 close，此时不再开始新的分发
                    Err(_) => return DispatchOutcome::Skipped,
                };
                dispatcher.dispatch(&notification).await
            });
            report.launched += 1;
        }
        drop(tasks);

        let elapsed = started.elapsed();
        self.metrics.record_tick(report.due, elapsed.as_secs_f64());
        StructuredLogger::log_tick_completed(
            report.due,
            report.launched,
            elapsed.as_millis() as u64,
        );

        report
    }

    /// 运行调度循环直到收到关闭信号，然后等待在飞的分发任务结束
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "通知调度器启动，间隔 {} 秒，最大并发分发 {}",
            self.config.tick_interval_seconds, self.config.max_concurrent_dispatches
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.tick_interval_seconds));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("调度器循环收到关闭信号");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.launched > 0 {
                        debug!("本次 tick 启动 {} 个分发任务", report.launched);
                    }
                }
            }
        }

        self.drain().await;
        info!("通知调度器已停止");
    }

    /// 等待在飞的分发任务，超过 `shutdown_timeout_seconds` 后中止剩余任务
    pub async fn drain(&self) {
        // 尚未拿到许可的任务不再开始分发
        self.semaphore.close();

        let mut tasks = self.tasks.lock().await;
        if tasks.is_empty() {
            return;
        }

        info!("等待 {} 个进行中的分发任务完成", tasks.len());
        let timeout = Duration::from_secs(self.config.shutdown_timeout_seconds);

        if tokio::time::timeout(timeout, Self::join_all(&mut tasks))
            .await
            .is_err()
        {
            warn!(
                "等待分发任务超时，中止剩余 {} 个任务，对应通知将由超时回收重新分发",
                tasks.len()
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }

    async fn join_all(tasks: &mut JoinSet<DispatchOutcome>) {
        while let Some(result) = tasks.join_next().await {
            Self::log_join_result(result);
        }
    }

    fn reap_finished(tasks: &mut JoinSet<DispatchOutcome>) {
        while let Some(result) = tasks.try_join_next() {
            Self::log_join_result(result);
        }
    }

    fn log_join_result(result: Result<DispatchOutcome, tokio::task::JoinError>) {
        if let Err(e) = result {
            if e.is_panic() {
                error!("分发任务异常退出: {}", e);
            }
        }
    }
}
