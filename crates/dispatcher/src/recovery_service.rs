use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crm_domain::repositories::NotificationRepository;
use crm_errors::CrmResult;
use crm_observability::{MetricsCollector, StructuredLogger};
use tracing::debug;

/// 超时认领回收
///
/// 进程在分发过程中退出会让通知停留在 `dispatching`，
/// 认领时间超过 `claim_timeout` 的通知被放回 `pending` 重新分发。
pub struct ClaimRecoveryService {
    notification_repo: Arc<dyn NotificationRepository>,
    claim_timeout: Duration,
    metrics: Arc<MetricsCollector>,
}

impl ClaimRecoveryService {
    pub fn new(
        notification_repo: Arc<dyn NotificationRepository>,
        claim_timeout_seconds: u64,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            notification_repo,
            claim_timeout: Duration::seconds(claim_timeout_seconds as i64),
            metrics,
        }
    }

    pub async fn reclaim_stale(&self, now: DateTime<Utc>) -> CrmResult<u64> {
        let cutoff = now - self.claim_timeout;
        let released = self.notification_repo.release_stale_claims(cutoff).await?;

        if released > 0 {
            StructuredLogger::log_stale_claims_released(released, cutoff);
            self.metrics.record_stale_claims_released(released);
        } else {
            debug!("没有需要回收的超时认领");
        }

        Ok(released)
    }
}
