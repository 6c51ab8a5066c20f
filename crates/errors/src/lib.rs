use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("通知未找到: {id}")]
    NotificationNotFound { id: i64 },
    #[error("联系人未找到: {id}")]
    PersonNotFound { id: i64 },
    #[error("消息发送错误: {0}")]
    Messaging(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("网络错误: {0}")]
    Network(String),
    #[error("内部错误: {0}")]
    Internal(String),
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("操作超时: {0}")]
    Timeout(String),
}

pub type CrmResult<T> = Result<T, CrmError>;

impl CrmError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn notification_not_found(id: i64) -> Self {
        Self::NotificationNotFound { id }
    }
    pub fn person_not_found(id: i64) -> Self {
        Self::PersonNotFound { id }
    }
    pub fn messaging<S: Into<String>>(msg: S) -> Self {
        Self::Messaging(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CrmError::NotificationNotFound { .. } | CrmError::PersonNotFound { .. }
        )
    }
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrmError::Internal(_) | CrmError::Configuration(_))
    }
    /// 暂时性基础设施错误，外部重新入队后可能成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrmError::Database(_)
                | CrmError::DatabaseOperation(_)
                | CrmError::Network(_)
                | CrmError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        CrmError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for CrmError {
    fn from(err: anyhow::Error) -> Self {
        CrmError::Internal(err.to_string())
    }
}
