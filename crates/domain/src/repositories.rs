//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，SQLite / PostgreSQL 实现位于基础设施层

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_errors::CrmResult;

use crate::entities::{Notification, NotificationStatus, Person};

/// 通知仓储抽象
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 插入通知并返回存储分配的 id
    async fn insert(&self, notification: &Notification) -> CrmResult<i64>;

    async fn get(&self, id: i64) -> CrmResult<Notification>;

    /// 无条件写入状态，没有匹配行时返回 `NotificationNotFound`
    async fn update_status(&self, id: i64, status: NotificationStatus) -> CrmResult<()>;

    /// `status = pending AND notification_time <= now`，不保证顺序
    async fn get_due(&self, now: DateTime<Utc>) -> CrmResult<Vec<Notification>>;

    /// 条件更新 `pending -> dispatching`，只有一个调用者能得到 `true`
    async fn claim(&self, id: i64, now: DateTime<Utc>) -> CrmResult<bool>;

    /// 把认领时间早于 `cutoff` 的 `dispatching` 通知放回 `pending`
    async fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> CrmResult<u64>;

    async fn list_by_person(&self, person_id: i64) -> CrmResult<Vec<Notification>>;
}

/// 联系人仓储抽象
#[async_trait]
pub trait PersonRepository: Send + Sync {
    async fn get(&self, id: i64) -> CrmResult<Person>;

    /// 在单个事务中写入联系人及其联系方式、工作经历和设置
    async fn insert(&self, person: &Person) -> CrmResult<i64>;
}
