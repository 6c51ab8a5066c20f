use chrono::{DateTime, Utc};
use crm_errors::CrmError;
use serde::{Deserialize, Serialize};

/// 提醒通知
///
/// 由外部生产者以 `Pending` 状态创建，之后只由分发器推进状态，
/// 引擎从不删除通知记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub person_id: i64,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    /// 从该时刻起通知可被分发，创建后不再修改
    pub notification_time: DateTime<Utc>,
    pub description: String,
    /// 被分发任务认领的时间，仅供超时回收使用
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// 创建一条待插入的保持联系提醒，`id` 由存储在插入时分配
    pub fn new_keep_in_touch(
        person_id: i64,
        notification_time: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            person_id,
            notification_type: NotificationType::KeepInTouch,
            status: NotificationStatus::Pending,
            notification_time,
            description: description.into(),
            claimed_at: None,
        }
    }

    /// 是否到期：状态为 `Pending` 且通知时间不晚于 `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == NotificationStatus::Pending && self.notification_time <= now
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    /// 已被某个分发任务认领，结果尚未写回
    Dispatching,
    Raised,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Dispatching => "dispatching",
            NotificationStatus::Raised => "raised",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Raised | NotificationStatus::Failed
        )
    }

    /// 状态机：终态不可离开，`Dispatching -> Pending` 只用于超时回收
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        use NotificationStatus::*;
        matches!(
            (self, next),
            (Pending, Dispatching)
                | (Pending, Raised)
                | (Pending, Failed)
                | (Dispatching, Raised)
                | (Dispatching, Failed)
                | (Dispatching, Pending)
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "dispatching" => Ok(NotificationStatus::Dispatching),
            "raised" => Ok(NotificationStatus::Raised),
            "failed" => Ok(NotificationStatus::Failed),
            _ => Err(CrmError::validation_error(format!(
                "Invalid notification status: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    KeepInTouch,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::KeepInTouch => "keep_in_touch",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationType {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_in_touch" => Ok(NotificationType::KeepInTouch),
            _ => Err(CrmError::validation_error(format!(
                "Invalid notification type: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_transitions() {
        use NotificationStatus::*;

        assert!(Pending.can_transition_to(Dispatching));
        assert!(Pending.can_transition_to(Raised));
        assert!(Pending.can_transition_to(Failed));
        assert!(Dispatching.can_transition_to(Raised));
        assert!(Dispatching.can_transition_to(Failed));
        assert!(Dispatching.can_transition_to(Pending));

        for terminal in [Raised, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Dispatching, Raised, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Pending.is_terminal());
        assert!(!Dispatching.is_terminal());
    }

    #[test]
    fn test_status_tokens() {
        for status in [
            NotificationStatus::Pending,
            NotificationStatus::Dispatching,
            NotificationStatus::Raised,
            NotificationStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<NotificationStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<NotificationStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&NotificationStatus::Dispatching).unwrap(),
            "\"dispatching\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationType::KeepInTouch).unwrap(),
            "\"keep_in_touch\""
        );
        assert_eq!(
            "keep_in_touch".parse::<NotificationType>().unwrap(),
            NotificationType::KeepInTouch
        );
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let mut notification = Notification::new_keep_in_touch(1, now, "call");
        assert!(notification.is_due(now));
        assert!(notification.is_due(now + Duration::seconds(1)));
        assert!(!notification.is_due(now - Duration::seconds(1)));

        notification.status = NotificationStatus::Raised;
        assert!(!notification.is_due(now));
    }
}
