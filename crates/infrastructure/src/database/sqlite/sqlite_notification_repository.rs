use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_domain::{
    entities::{Notification, NotificationStatus},
    repositories::NotificationRepository,
};
use crm_errors::{CrmError, CrmResult};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

const NOTIFICATION_COLUMNS: &str =
    "id, person_id, notification_type, status, notification_time, description, claimed_at";

pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> CrmResult<Notification> {
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
impl NotificationRepository for SqliteNotificationRepository {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::SQLITE_SCHEMA;
    use chrono::Duration;
    use std::sync::Arc;

    async fn setup_test_db() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for statement in SQLITE_SCHEMA {
            sqlx::query(*statement).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = SqliteNotificationRepository::new(setup_test_db().await);
        let time = Utc::now();

        let id = repo
            .insert(&Notification::new_keep_in_touch(42, time, "coffee"))
            .await
            .unwrap();
        assert!(id > 0);

        let stored = repo.get(id).await.unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.person_id, 42);
        assert_eq!(stored.status, NotificationStatus::Pending);
        assert_eq!(stored.notification_time, time);
        assert_eq!(stored.description, "coffee");
        assert!(stored.claimed_at.is_none());
    }

    #[tokio::test]
    async fn test_get_looks_up_by_id_not_person() {
        let repo = SqliteNotificationRepository::new(setup_test_db().await);
        let first = repo
            .insert(&Notification::new_keep_in_touch(1, Utc::now(), "a"))
            .await
            .unwrap();
        let second = repo
            .insert(&Notification::new_keep_in_touch(first, Utc::now(), "b"))
            .await
            .unwrap();

        // 第二条通知的 person_id 与第一条通知的 id 相同
        let fetched = repo.get(first).await.unwrap();
        assert_eq!(fetched.id, first);
        assert_eq!(fetched.description, "a");

        let fetched = repo.get(second).await.unwrap();
        assert_eq!(fetched.description, "b");

        let missing = repo.get(999).await;
        assert!(matches!(
            missing,
            Err(CrmError::NotificationNotFound { id: 999 })
        ));
    }

    #[tokio::test]
    async fn test_get_due_is_exact() {
        let repo = SqliteNotificationRepository::new(setup_test_db().await);
        let now = Utc::now();

        let past = repo
            .insert(&Notification::new_keep_in_touch(1, now - Duration::minutes(5), "past"))
            .await
            .unwrap();
        let exact = repo
            .insert(&Notification::new_keep_in_touch(1, now, "exact"))
            .await
            .unwrap();
        let future = repo
            .insert(&Notification::new_keep_in_touch(1, now + Duration::minutes(5), "future"))
            .await
            .unwrap();
        let raised = repo
            .insert(&Notification::new_keep_in_touch(1, now - Duration::minutes(1), "raised"))
            .await
            .unwrap();
        repo.update_status(raised, NotificationStatus::Raised)
            .await
            .unwrap();

        let mut due: Vec<i64> = repo.get_due(now).await.unwrap().iter().map(|n| n.id).collect();
        due.sort();
        assert_eq!(due, vec![past, exact]);
        assert!(!due.contains(&future));
    }

    #[tokio::test]
    async fn test_update_status_missing_row() {
        let repo = SqliteNotificationRepository::new(setup_test_db().await);
        let result = repo.update_status(404, NotificationStatus::Failed).await;
        assert!(matches!(
            result,
            Err(CrmError::NotificationNotFound { id: 404 })
        ));
    }

    #[tokio::test]
    async fn test_claim_only_once() {
        let repo = SqliteNotificationRepository::new(setup_test_db().await);
        let now = Utc::now();
        let id = repo
            .insert(&Notification::new_keep_in_touch(1, now, "once"))
            .await
            .unwrap();

        assert!(repo.claim(id, now).await.unwrap());
        assert!(!repo.claim(id, now).await.unwrap());

        let stored = repo.get(id).await.unwrap();
        assert_eq!(stored.status, NotificationStatus::Dispatching);
        assert_eq!(stored.claimed_at, Some(now));

        // 已认领的通知不再出现在到期查询中
        assert!(repo.get_due(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let repo = Arc::new(SqliteNotificationRepository::new(setup_test_db().await));
        let now = Utc::now();
        let id = repo
            .insert(&Notification::new_keep_in_touch(1, now, "race"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.claim(id, now).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_release_stale_claims() {
        let repo = SqliteNotificationRepository::new(setup_test_db().await);
        let now = Utc::now();

        let stale = repo
            .insert(&Notification::new_keep_in_touch(1, now - Duration::hours(1), "stale"))
            .await
            .unwrap();
        let fresh = repo
            .insert(&Notification::new_keep_in_touch(1, now - Duration::hours(1), "fresh"))
            .await
            .unwrap();
        repo.claim(stale, now - Duration::minutes(30)).await.unwrap();
        repo.claim(fresh, now).await.unwrap();

        let released = repo
            .release_stale_claims(now - Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(released, 1);

        let stale = repo.get(stale).await.unwrap();
        assert_eq!(stale.status, NotificationStatus::Pending);
        assert!(stale.claimed_at.is_none());
        assert_eq!(
            repo.get(fresh).await.unwrap().status,
            NotificationStatus::Dispatching
        );
    }

    #[tokio::test]
    async fn test_list_by_person_ordered() {
        let repo = SqliteNotificationRepository::new(setup_test_db().await);
        let now = Utc::now();

        let later = repo
            .insert(&Notification::new_keep_in_touch(5, now + Duration::days(2), "later"))
            .await
            .unwrap();
        let sooner = repo
            .insert(&Notification::new_keep_in_touch(5, now + Duration::days(1), "sooner"))
            .await
            .unwrap();
        repo.insert(&Notification::new_keep_in_touch(6, now, "other"))
            .await
            .unwrap();

        let ids: Vec<i64> = repo
            .list_by_person(5)
            .await
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![sooner, later]);
    }
}
