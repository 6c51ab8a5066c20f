use anyhow::Result;
use chrono::{Duration, Utc};
use crm_domain::entities::{Notification, NotificationStatus, Person};
use crm_domain::repositories::{NotificationRepository, PersonRepository};
use crm_errors::CrmError;
use crm_infrastructure::database::{DatabaseManager, DatabaseType};
use crm_testing_utils::{DatabaseTestContainer, PersonBuilder};

async fn setup() -> Result<(DatabaseTestContainer, DatabaseManager)> {
    let container = DatabaseTestContainer::new().await?;
    let manager = DatabaseManager::connect(&container.database_url).await?;
    assert_eq!(manager.database_type(), DatabaseType::PostgreSQL);
    manager.ensure_schema().await?;
    // 第二次执行不应报错
    manager.ensure_schema().await?;
    Ok((container, manager))
}

#[tokio::test]
#[ignore] // 需要 Docker
async fn test_postgres_notification_lifecycle() -> Result<()> {
    let (container, manager) = setup().await?;
    let repo = manager.notification_repository();
    let now = Utc::now();

    let due_id = repo
        .insert(&Notification::new_keep_in_touch(1, now - Duration::hours(1), "due"))
        .await?;
    let future_id = repo
        .insert(&Notification::new_keep_in_touch(1, now + Duration::hours(1), "future"))
        .await?;
    assert!(future_id > due_id);

    let due = repo.get_due(now).await?;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, due_id);
    assert_eq!(due[0].description, "due");

    assert!(repo.claim(due_id, now).await?);
    assert!(!repo.claim(due_id, now).await?);
    assert!(repo.get_due(now).await?.is_empty());

    let released = repo
        .release_stale_claims(now + Duration::seconds(1))
        .await?;
    assert_eq!(released, 1);
    assert_eq!(repo.get(due_id).await?.status, NotificationStatus::Pending);

    repo.update_status(due_id, NotificationStatus::Raised).await?;
    assert_eq!(repo.get(due_id).await?.status, NotificationStatus::Raised);

    assert!(matches!(
        repo.update_status(9999, NotificationStatus::Failed).await,
        Err(CrmError::NotificationNotFound { id: 9999 })
    ));

    let listed: Vec<i64> = repo.list_by_person(1).await?.iter().map(|n| n.id).collect();
    assert_eq!(listed, vec![due_id, future_id]);

    container.clean_tables().await?;
    assert!(repo.list_by_person(1).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore] // 需要 Docker
async fn test_postgres_person_roundtrip() -> Result<()> {
    let (_container, manager) = setup().await?;
    let repo = manager.person_repository();

    let person = PersonBuilder::new()
        .with_first_name("Grace")
        .with_last_name("Hopper")
        .with_contact("email", "grace@example.com")
        .with_job("Navy", "Rear Admiral", true)
        .with_birthday_notify(true)
        .build();
    let id = repo.insert(&person).await?;

    let stored = repo.get(id).await?;
    assert_eq!(stored.display_name(), "Grace Hopper");
    assert_eq!(stored.contact_infos.len(), 1);
    assert_eq!(stored.current_job().map(|j| j.company.as_str()), Some("Navy"));
    assert!(stored.settings.birthday_notify);

    assert!(matches!(
        repo.get(id + 100).await,
        Err(CrmError::PersonNotFound { .. })
    ));

    let minimal: Person = PersonBuilder::new().without_last_name().build();
    let minimal_id = repo.insert(&minimal).await?;
    assert_eq!(repo.get(minimal_id).await?.last_name, None);
    Ok(())
}
