use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use crm_domain::{
    entities::{Notification, NotificationStatus},
    messaging::MessagingGateway,
    repositories::{NotificationRepository, PersonRepository},
};
use crm_errors::CrmError;
use crm_observability::{MetricsCollector, StructuredLogger};
use thiserror::Error;
use tracing::{instrument, warn};

use crate::message::render_message;

/// `failed` 状态写入的最大尝试次数
const FAILED_PERSIST_ATTEMPTS: u32 = 3;
const FAILED_PERSIST_BACKOFF: Duration = Duration::from_millis(50);

/// 单条通知分发失败的原因，均为本次分发的终态，不做重试
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("联系人不存在: {person_id}")]
    PersonNotFound { person_id: i64 },

    #[error("查询联系人失败: {0}")]
    PersonLookupFailed(#[source] CrmError),

    #[error("消息发送失败: {0}")]
    MessageSendFailed(#[source] CrmError),

    #[error("写入通知状态 {status} 失败: {source}")]
    StatusPersistFailed {
        status: NotificationStatus,
        #[source]
        source: CrmError,
    },

    /// 认领写入失败，通知保持 `pending`，下一次 tick 会重新尝试
    #[error("认领通知失败: {0}")]
    ClaimFailed(#[source] CrmError),

    /// 此前已判定失败但 `failed` 未能写入，回收后再次认领时不重新发送
    #[error("通知此前已判定失败: {reason}")]
    PreviouslyFailed { reason: String },
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Raised,
    Failed(DispatchError),
    /// 通知已被其他分发任务认领，本次没有发送任何消息
    Skipped,
}

impl DispatchOutcome {
    pub fn is_raised(&self) -> bool {
        matches!(self, DispatchOutcome::Raised)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DispatchOutcome::Skipped)
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            DispatchOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// 单条通知的分发逻辑：认领、查询联系人、发送消息、写回状态
pub struct NotificationDispatcher {
    notification_repo: Arc<dyn NotificationRepository>,
    person_repo: Arc<dyn PersonRepository>,
    gateway: Arc<dyn MessagingGateway>,
    recipient: i64,
    metrics: Arc<MetricsCollector>,
    /// 已判定失败、但 `failed` 尚未写入存储的通知及失败原因
    unpersisted_failures: StdMutex<HashMap<i64, String>>,
}

impl NotificationDispatcher {
    pub fn new(
        notification_repo: Arc<dyn NotificationRepository>,
        person_repo: Arc<dyn PersonRepository>,
        gateway: Arc<dyn MessagingGateway>,
        recipient: i64,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            notification_repo,
            person_repo,
            gateway,
            recipient,
            metrics,
            unpersisted_failures: StdMutex::new(HashMap::new()),
        }
    }

    /// 已判定失败但状态尚未落库的通知数
    pub fn unpersisted_failure_count(&self) -> usize {
        self.failures().len()
    }

    fn failures(&self) -> std::sync::MutexGuard<'_, HashMap<i64, String>> {
        match self.unpersisted_failures.lock() {
            Ok(failures) => failures,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[instrument(skip(self, notification), fields(
        notification_id = notification.id,
        person_id = notification.person_id,
    ))]
    pub async fn dispatch(&self, notification: &Notification) -> DispatchOutcome {
        let started = Instant::now();

        match self.notification_repo.claim(notification.id, Utc::now()).await {
            Ok(true) => {
                StructuredLogger::log_notification_claimed(notification.id, notification.person_id)
            }
            Ok(false) => {
                StructuredLogger::log_notification_skipped(notification.id);
                self.metrics.record_notification_skipped();
                return DispatchOutcome::Skipped;
            }
            Err(e) => {
                let err = DispatchError::ClaimFailed(e);
                StructuredLogger::log_notification_failed(
                    notification.id,
                    notification.person_id,
                    &err.to_string(),
                );
                self.metrics
                    .record_notification_failed(started.elapsed().as_secs_f64());
                return DispatchOutcome::Failed(err);
            }
        }

        let previous_failure = self.failures().get(&notification.id).cloned();
        let outcome = match previous_failure {
            Some(reason) => {
                warn!("通知 {} 此前已判定失败，不再发送，补写失败状态", notification.id);
                self.finish_failed(notification, DispatchError::PreviouslyFailed { reason })
                    .await
            }
            None => match self.deliver(notification).await {
                Ok(()) => self.finish_raised(notification).await,
                Err(err) => self.finish_failed(notification, err).await,
            },
        };

        let elapsed = started.elapsed();
        match &outcome {
            DispatchOutcome::Raised => {
                StructuredLogger::log_notification_raised(
                    notification.id,
                    notification.person_id,
                    elapsed.as_millis() as u64,
                );
                self.metrics.record_notification_raised(elapsed.as_secs_f64());
            }
            DispatchOutcome::Failed(err) => {
                StructuredLogger::log_notification_failed(
                    notification.id,
                    notification.person_id,
                    &err.to_string(),
                );
                self.metrics.record_notification_failed(elapsed.as_secs_f64());
            }
            DispatchOutcome::Skipped => {}
        }

        outcome
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DispatchError> {
        let person = self
            .person_repo
            .get(notification.person_id)
            .await
            .map_err(|e| match e {
                CrmError::PersonNotFound { id } => DispatchError::PersonNotFound { person_id: id },
                other => DispatchError::PersonLookupFailed(other),
            })?;

        let text = render_message(&person, notification.notification_type);

        self.gateway
            .send(self.recipient, &text)
            .await
            .map_err(DispatchError::MessageSendFailed)
    }

    async fn finish_raised(&self, notification: &Notification) -> DispatchOutcome {
        match self
            .notification_repo
            .update_status(notification.id, NotificationStatus::Raised)
            .await
        {
            Ok(()) => DispatchOutcome::Raised,
            // 消息已经发出，无法撤回；通知停留在 dispatching，超时后会被回收重发
            Err(source) => {
                StructuredLogger::log_status_persist_failed(
                    notification.id,
                    NotificationStatus::Raised.as_str(),
                    &source.to_string(),
                );
                DispatchOutcome::Failed(DispatchError::StatusPersistFailed {
                    status: NotificationStatus::Raised,
                    source,
                })
            }
        }
    }

    /// 失败是终态：`failed` 写入有限次重试，仍失败时记下判定结果，
    /// 回收后再次认领到这条通知只补写状态，不重新发送
    async fn finish_failed(&self, notification: &Notification, err: DispatchError) -> DispatchOutcome {
        let mut attempt = 1;
        loop {
            match self
                .notification_repo
                .update_status(notification.id, NotificationStatus::Failed)
                .await
            {
                Ok(()) => {
                    self.failures().remove(&notification.id);
                    break;
                }
                Err(e) if attempt < FAILED_PERSIST_ATTEMPTS => {
                    warn!(
                        "通知 {} 第 {} 次写入失败状态出错，稍后重试: {}",
                        notification.id, attempt, e
                    );
                    tokio::time::sleep(FAILED_PERSIST_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    StructuredLogger::log_status_persist_failed(
                        notification.id,
                        NotificationStatus::Failed.as_str(),
                        &e.to_string(),
                    );
                    let reason = match &err {
                        DispatchError::PreviouslyFailed { reason } => reason.clone(),
                        other => other.to_string(),
                    };
                    self.failures().insert(notification.id, reason);
                    break;
                }
            }
        }
        DispatchOutcome::Failed(err)
    }
}
