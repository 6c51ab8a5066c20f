use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_domain::{
    entities::{Notification, NotificationStatus},
    repositories::NotificationRepository,
};
use crm_errors::{CrmError, CrmResult};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

const NOTIFICATION_COLUMNS: &str =
    "id, person_id, notification_type, status, notification_time, description, claimed_at";

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_notification(row: &sqlx::postgres::PgRow) -> CrmResult<Notification> {
        Ok(Notification {
            id: row.try_get("id")?,
            person_id: row.try_get("person_id")?,
            notification_type: row.try_get("notification_type")?,
            status: row.try_get("status")?,
            notification_time: row.try_get("notification_time")?,
            description: row.try_get("description")?,
            claimed_at: row.try_get("claimed_at")?,
        })
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    #[instrument(skip(self, notification), fields(
        person_id = %notification.person_id,
        notification_type = %notification.notification_type,
    ))]
    async fn insert(&self, notification: &Notification) -> CrmResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (person_id, notification_type, status, notification_time, description, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(notification.person_id)
        .bind(notification.notification_type)
        .bind(notification.status)
        .bind(notification.notification_time)
        .bind(&notification.description)
        .bind(notification.claimed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::notification_database_error(RepositoryOperation::Create, None, e)
        })?;

        let id: i64 = row.try_get("id")?;
        debug!("创建通知成功: {}", id);
        Ok(id)
    }

    async fn get(&self, id: i64) -> CrmResult<Notification> {
        let row = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::notification_database_error(
                RepositoryOperation::Read,
                Some(id),
                e,
            )
        })?;

        match row {
            Some(row) => Self::row_to_notification(&row),
            None => Err(CrmError::notification_not_found(id)),
        }
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: i64, status: NotificationStatus) -> CrmResult<()> {
        let result = sqlx::query("UPDATE notifications SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                RepositoryErrorHelpers::notification_database_error(
                    RepositoryOperation::Update,
                    Some(id),
                    e,
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(CrmError::notification_not_found(id));
        }

        debug!("更新通知状态成功: {} -> {}", id, status);
        Ok(())
    }

    async fn get_due(&self, now: DateTime<Utc>) -> CrmResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE status = $1 AND notification_time <= $2"
        ))
        .bind(NotificationStatus::Pending)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::notification_database_error(RepositoryOperation::Query, None, e)
        })?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    async fn claim(&self, id: i64, now: DateTime<Utc>) -> CrmResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $1, claimed_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(NotificationStatus::Dispatching)
        .bind(now)
        .bind(id)
        .bind(NotificationStatus::Pending)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::notification_database_error(
                RepositoryOperation::Claim,
                Some(id),
                e,
            )
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> CrmResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $1, claimed_at = NULL WHERE status = $2 AND claimed_at < $3",
        )
        .bind(NotificationStatus::Pending)
        .bind(NotificationStatus::Dispatching)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::notification_database_error(
                RepositoryOperation::Release,
                None,
                e,
            )
        })?;

        Ok(result.rows_affected())
    }

    async fn list_by_person(&self, person_id: i64) -> CrmResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE person_id = $1 ORDER BY notification_time, id"
        ))
        .bind(person_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::notification_database_error(RepositoryOperation::Read, None, e)
        })?;

        rows.iter().map(Self::row_to_notification).collect()
    }
}
