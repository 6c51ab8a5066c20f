use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_dispatcher::{
    ClaimRecoveryService, DispatchError, DispatchOutcome, NotificationDispatcher,
};
use crm_domain::entities::{Notification, NotificationStatus};
use crm_domain::repositories::{NotificationRepository, PersonRepository};
use crm_errors::{CrmError, CrmResult};
use crm_observability::MetricsCollector;
use crm_testing_utils::{
    MockMessagingGateway, MockNotificationRepository, MockPersonRepository, NotificationBuilder,
    PersonBuilder,
};

const RECIPIENT: i64 = 424242;

struct Fixture {
    notifications: Arc<MockNotificationRepository>,
    persons: Arc<MockPersonRepository>,
    gateway: Arc<MockMessagingGateway>,
    dispatcher: Arc<NotificationDispatcher>,
}

fn fixture(notifications: Vec<Notification>, gateway: MockMessagingGateway) -> Fixture {
    let notifications = Arc::new(MockNotificationRepository::with_notifications(notifications));
    let persons = Arc::new(MockPersonRepository::with_persons(vec![PersonBuilder::new()
        .with_id(1)
        .with_first_name("John")
        .with_last_name("Smith")
        .build()]));
    let gateway = Arc::new(gateway);

    let dispatcher = Arc::new(NotificationDispatcher::new(
        notifications.clone(),
        persons.clone(),
        gateway.clone(),
        RECIPIENT,
        Arc::new(MetricsCollector::new()),
    ));

    Fixture {
        notifications,
        persons,
        gateway,
        dispatcher,
    }
}

#[tokio::test]
async fn test_dispatch_sends_message_and_marks_raised() {
    let notification = NotificationBuilder::new().with_id(1).with_person_id(1).build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::new());

    let outcome = f.dispatcher.dispatch(&notification).await;

    assert!(outcome.is_raised());
    let sent = f.gateway.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, RECIPIENT);
    assert!(sent[0].text.contains("John"));
    assert!(sent[0].text.contains("Smith"));
    assert_eq!(
        f.notifications.get_notification(1).map(|n| n.status),
        Some(NotificationStatus::Raised)
    );
}

#[tokio::test]
async fn test_dispatch_missing_person_fails_without_sending() {
    let notification = NotificationBuilder::new().with_id(7).with_person_id(99).build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::new());

    let outcome = f.dispatcher.dispatch(&notification).await;

    assert!(matches!(
        outcome.error(),
        Some(DispatchError::PersonNotFound { person_id: 99 })
    ));
    assert_eq!(f.gateway.call_count(), 0);
    assert_eq!(
        f.notifications.get_notification(7).map(|n| n.status),
        Some(NotificationStatus::Failed)
    );
}

#[tokio::test]
async fn test_dispatch_person_lookup_error() {
    let notification = NotificationBuilder::new().build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::new());
    f.persons.set_fail_get(true);

    let outcome = f.dispatcher.dispatch(&notification).await;

    assert!(matches!(
        outcome.error(),
        Some(DispatchError::PersonLookupFailed(_))
    ));
    assert_eq!(f.gateway.call_count(), 0);
    assert_eq!(
        f.notifications.get_notification(1).map(|n| n.status),
        Some(NotificationStatus::Failed)
    );
}

#[tokio::test]
async fn test_dispatch_send_failure_marks_failed() {
    let notification = NotificationBuilder::new().build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::failing());

    let outcome = f.dispatcher.dispatch(&notification).await;

    assert!(matches!(
        outcome.error(),
        Some(DispatchError::MessageSendFailed(CrmError::Messaging(_)))
    ));
    assert_eq!(f.gateway.call_count(), 1);
    assert_eq!(
        f.notifications.get_notification(1).map(|n| n.status),
        Some(NotificationStatus::Failed)
    );
}

#[tokio::test]
async fn test_dispatch_person_without_last_name() {
    let f = fixture(vec![], MockMessagingGateway::new());
    let person_id = f
        .persons
        .insert(&PersonBuilder::new().with_first_name("Anna").without_last_name().build())
        .await
        .unwrap();
    let notification = NotificationBuilder::new().with_person_id(person_id).build();
    f.notifications.insert(&notification).await.unwrap();

    let outcome = f.dispatcher.dispatch(&notification).await;

    assert!(outcome.is_raised());
    let sent = f.gateway.sent_messages();
    assert_eq!(sent[0].text, "It's time to get in touch with Anna");
}

#[tokio::test]
async fn test_concurrent_dispatch_of_same_notification_sends_once() {
    let notification = NotificationBuilder::new().build();
    let f = fixture(
        vec![notification.clone()],
        MockMessagingGateway::with_delay(std::time::Duration::from_millis(50)),
    );

    let first = {
        let dispatcher = f.dispatcher.clone();
        let notification = notification.clone();
        tokio::spawn(async move { dispatcher.dispatch(&notification).await })
    };
    let second = {
        let dispatcher = f.dispatcher.clone();
        let notification = notification.clone();
        tokio::spawn(async move { dispatcher.dispatch(&notification).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_raised()).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_skipped()).count(), 1);
    assert_eq!(f.gateway.call_count(), 1);
    assert_eq!(
        f.notifications.status_updates(),
        vec![(1, NotificationStatus::Raised)]
    );
}

#[tokio::test]
async fn test_dispatch_already_raised_is_skipped() {
    let notification = NotificationBuilder::new()
        .with_status(NotificationStatus::Raised)
        .build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::new());

    let outcome = f.dispatcher.dispatch(&notification).await;

    assert!(outcome.is_skipped());
    assert_eq!(f.gateway.call_count(), 0);
    assert!(f.notifications.status_updates().is_empty());
}

#[tokio::test]
async fn test_raised_persist_failure_leaves_claim_for_recovery() {
    let notification = NotificationBuilder::new().build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::new());
    f.notifications.set_fail_update_status(true);

    let outcome = f.dispatcher.dispatch(&notification).await;

    match outcome {
        DispatchOutcome::Failed(DispatchError::StatusPersistFailed { status, .. }) => {
            assert_eq!(status, NotificationStatus::Raised);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(f.gateway.call_count(), 1);
    let stored = f.notifications.get_notification(1).unwrap();
    assert_eq!(stored.status, NotificationStatus::Dispatching);
    assert!(stored.claimed_at.is_some());
}

#[tokio::test]
async fn test_failed_status_write_is_retried() {
    let notification = NotificationBuilder::new().build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::failing());
    f.notifications.fail_next_status_updates(2);

    let outcome = f.dispatcher.dispatch(&notification).await;

    assert!(matches!(
        outcome.error(),
        Some(DispatchError::MessageSendFailed(_))
    ));
    assert_eq!(
        f.notifications.get_notification(1).map(|n| n.status),
        Some(NotificationStatus::Failed)
    );
    assert_eq!(f.dispatcher.unpersisted_failure_count(), 0);
}

#[tokio::test]
async fn test_reclaimed_failure_is_not_sent_again() {
    let notification = NotificationBuilder::new().build();
    let f = fixture(vec![notification.clone()], MockMessagingGateway::failing());
    let recovery = ClaimRecoveryService::new(
        f.notifications.clone(),
        60,
        Arc::new(MetricsCollector::new()),
    );
    f.notifications.set_fail_update_status(true);

    let first = f.dispatcher.dispatch(&notification).await;
    assert!(matches!(
        first.error(),
        Some(DispatchError::MessageSendFailed(_))
    ));
    assert_eq!(
        f.notifications.get_notification(1).map(|n| n.status),
        Some(NotificationStatus::Dispatching)
    );
    assert_eq!(f.dispatcher.unpersisted_failure_count(), 1);

    // 存储恢复后，超时回收把通知放回 pending
    f.notifications.set_fail_update_status(false);
    let later = Utc::now() + chrono::Duration::minutes(10);
    assert_eq!(recovery.reclaim_stale(later).await.unwrap(), 1);

    let second = f.dispatcher.dispatch(&notification).await;

    assert!(matches!(
        second.error(),
        Some(DispatchError::PreviouslyFailed { .. })
    ));
    assert_eq!(f.gateway.call_count(), 1);
    assert_eq!(
        f.notifications.get_notification(1).map(|n| n.status),
        Some(NotificationStatus::Failed)
    );
    assert_eq!(f.dispatcher.unpersisted_failure_count(), 0);
}

/// 认领阶段存储不可用的仓储
struct UnavailableRepository;

#[async_trait]
impl NotificationRepository for UnavailableRepository {
    async fn insert(&self, _notification: &Notification) -> CrmResult<i64> {
        Err(CrmError::database_error("unavailable"))
    }

    async fn get(&self, id: i64) -> CrmResult<Notification> {
        Err(CrmError::notification_not_found(id))
    }

    async fn update_status(&self, _id: i64, _status: NotificationStatus) -> CrmResult<()> {
        Err(CrmError::database_error("unavailable"))
    }

    async fn get_due(&self, _now: DateTime<Utc>) -> CrmResult<Vec<Notification>> {
        Err(CrmError::database_error("unavailable"))
    }

    async fn claim(&self, _id: i64, _now: DateTime<Utc>) -> CrmResult<bool> {
        Err(CrmError::database_error("unavailable"))
    }

    async fn release_stale_claims(&self, _cutoff: DateTime<Utc>) -> CrmResult<u64> {
        Err(CrmError::database_error("unavailable"))
    }

    async fn list_by_person(&self, _person_id: i64) -> CrmResult<Vec<Notification>> {
        Err(CrmError::database_error("unavailable"))
    }
}

#[tokio::test]
async fn test_claim_error_does_not_send() {
    let gateway = Arc::new(MockMessagingGateway::new());
    let dispatcher = NotificationDispatcher::new(
        Arc::new(UnavailableRepository),
        Arc::new(MockPersonRepository::new()),
        gateway.clone(),
        RECIPIENT,
        Arc::new(MetricsCollector::new()),
    );

    let outcome = dispatcher.dispatch(&NotificationBuilder::new().build()).await;

    assert!(matches!(outcome.error(), Some(DispatchError::ClaimFailed(_))));
    assert_eq!(gateway.call_count(), 0);
}
