//! 仓储操作的错误上下文
//!
//! 数据库错误在返回前记录实体和操作，调用方只需要处理 `CrmError`。

use crm_errors::CrmError;
use std::fmt;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Query,
    Claim,
    Release,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Query => write!(f, "批量查询"),
            RepositoryOperation::Claim => write!(f, "认领"),
            RepositoryOperation::Release => write!(f, "回收"),
        }
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    pub fn notification_database_error(
        operation: RepositoryOperation,
        notification_id: Option<i64>,
        error: sqlx::Error,
    ) -> CrmError {
        error!(
            operation = %operation,
            notification_id = ?notification_id,
            error = %error,
            "{}通知失败",
            operation
        );
        CrmError::Database(error)
    }

    pub fn person_database_error(
        operation: RepositoryOperation,
        person_id: Option<i64>,
        error: sqlx::Error,
    ) -> CrmError {
        error!(
            operation = %operation,
            person_id = ?person_id,
            error = %error,
            "{}联系人失败",
            operation
        );
        CrmError::Database(error)
    }
}
