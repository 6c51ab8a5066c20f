//! Mock implementations for the repository and gateway traits
//!
//! In-memory doubles for unit testing without a database or a live
//! Telegram bot. Failure toggles let tests drive the error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_domain::entities::{Notification, NotificationStatus, Person};
use crm_domain::messaging::MessagingGateway;
use crm_domain::repositories::{NotificationRepository, PersonRepository};
use crm_errors::{CrmError, CrmResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock implementation of NotificationRepository for testing
///
/// `claim` is atomic under the map lock, so concurrent dispatches of the
/// same id observe exactly one winner, as with the SQL implementations.
#[derive(Debug, Clone)]
pub struct MockNotificationRepository {
    notifications: Arc<Mutex<HashMap<i64, Notification>>>,
    next_id: Arc<Mutex<i64>>,
    status_updates: Arc<Mutex<Vec<(i64, NotificationStatus)>>>,
    get_due_calls: Arc<AtomicUsize>,
    fail_get_due: Arc<AtomicBool>,
    fail_update_status: Arc<AtomicBool>,
    update_status_failures: Arc<AtomicUsize>,
    get_due_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockNotificationRepository {
    pub fn new() -> Self {
        Self {
            notifications: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            status_updates: Arc::new(Mutex::new(Vec::new())),
            get_due_calls: Arc::new(AtomicUsize::new(0)),
            fail_get_due: Arc::new(AtomicBool::new(false)),
            fail_update_status: Arc::new(AtomicBool::new(false)),
            update_status_failures: Arc::new(AtomicUsize::new(0)),
            get_due_delay: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_notifications(notifications: Vec<Notification>) -> Self {
        let repo = Self::new();
        let mut max_id = 0;
        {
            let mut map = repo.notifications.lock().unwrap();
            for notification in notifications {
                max_id = max_id.max(notification.id);
                map.insert(notification.id, notification);
            }
        }
        *repo.next_id.lock().unwrap() = max_id + 1;
        repo
    }

    pub fn get_notification(&self, id: i64) -> Option<Notification> {
        self.notifications.lock().unwrap().get(&id).cloned()
    }

    pub fn get_all_notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().values().cloned().collect()
    }

    pub fn count_with_status(&self, status: NotificationStatus) -> usize {
        self.notifications
            .lock()
            .unwrap()
            .values()
            .filter(|n| n.status == status)
            .count()
    }

    /// Every `update_status` call that succeeded, in call order
    pub fn status_updates(&self) -> Vec<(i64, NotificationStatus)> {
        self.status_updates.lock().unwrap().clone()
    }

    pub fn get_due_calls(&self) -> usize {
        self.get_due_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_get_due(&self, fail: bool) {
        self.fail_get_due.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_update_status(&self, fail: bool) {
        self.fail_update_status.store(fail, Ordering::SeqCst);
    }

    pub fn set_get_due_delay(&self, delay: Option<Duration>) {
        *self.get_due_delay.lock().unwrap() = delay;
    }

    /// Fail only the next `times` status updates.
    pub fn fail_next_status_updates(&self, times: usize) {
        self.update_status_failures.store(times, Ordering::SeqCst);
    }
}

impl Default for MockNotificationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationRepository for MockNotificationRepository {
    async fn insert(&self, notification: &Notification) -> CrmResult<i64> {
        let mut notifications = self.notifications.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_notification = notification.clone();
        new_notification.id = *next_id;
        *next_id += 1;

        let id = new_notification.id;
        notifications.insert(id, new_notification);
        Ok(id)
    }

    async fn get(&self, id: i64) -> CrmResult<Notification> {
        self.get_notification(id)
            .ok_or_else(|| CrmError::notification_not_found(id))
    }

    async fn update_status(&self, id: i64, status: NotificationStatus) -> CrmResult<()> {
        let fail_once = self
            .update_status_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail_once || self.fail_update_status.load(Ordering::SeqCst) {
            return Err(CrmError::database_error("mock update_status failure"));
        }

        let mut notifications = self.notifications.lock().unwrap();
        match notifications.get_mut(&id) {
            Some(notification) => {
                notification.status = status;
                self.status_updates.lock().unwrap().push((id, status));
                Ok(())
            }
            None => Err(CrmError::notification_not_found(id)),
        }
    }

    async fn get_due(&self, now: DateTime<Utc>) -> CrmResult<Vec<Notification>> {
        self.get_due_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.get_due_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_get_due.load(Ordering::SeqCst) {
            return Err(CrmError::database_error("mock get_due failure"));
        }

        let notifications = self.notifications.lock().unwrap();
        Ok(notifications
            .values()
            .filter(|n| n.is_due(now))
            .cloned()
            .collect())
    }

    async fn claim(&self, id: i64, now: DateTime<Utc>) -> CrmResult<bool> {
        let mut notifications = self.notifications.lock().unwrap();
        match notifications.get_mut(&id) {
            Some(notification) if notification.status == NotificationStatus::Pending => {
                notification.status = NotificationStatus::Dispatching;
                notification.claimed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> CrmResult<u64> {
        let mut notifications = self.notifications.lock().unwrap();
        let mut released = 0;
        for notification in notifications.values_mut() {
            let stale = notification.status == NotificationStatus::Dispatching
                && notification.claimed_at.is_some_and(|at| at < cutoff);
            if stale {
                notification.status = NotificationStatus::Pending;
                notification.claimed_at = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn list_by_person(&self, person_id: i64) -> CrmResult<Vec<Notification>> {
        let notifications = self.notifications.lock().unwrap();
        let mut result: Vec<Notification> = notifications
            .values()
            .filter(|n| n.person_id == person_id)
            .cloned()
            .collect();
        result.sort_by_key(|n| (n.notification_time, n.id));
        Ok(result)
    }
}

/// Mock implementation of PersonRepository for testing
#[derive(Debug, Clone)]
pub struct MockPersonRepository {
    persons: Arc<Mutex<HashMap<i64, Person>>>,
    next_id: Arc<Mutex<i64>>,
    get_calls: Arc<AtomicUsize>,
    fail_get: Arc<AtomicBool>,
}

impl MockPersonRepository {
    pub fn new() -> Self {
        Self {
            persons: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            get_calls: Arc::new(AtomicUsize::new(0)),
            fail_get: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_persons(persons: Vec<Person>) -> Self {
        let repo = Self::new();
        let mut max_id = 0;
        {
            let mut map = repo.persons.lock().unwrap();
            for person in persons {
                max_id = max_id.max(person.id);
                map.insert(person.id, person);
            }
        }
        *repo.next_id.lock().unwrap() = max_id + 1;
        repo
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Simulate a store outage on lookups
    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockPersonRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersonRepository for MockPersonRepository {
    async fn get(&self, id: i64) -> CrmResult<Person> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CrmError::database_error("mock person lookup failure"));
        }

        self.persons
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CrmError::person_not_found(id))
    }

    async fn insert(&self, person: &Person) -> CrmResult<i64> {
        let mut persons = self.persons.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_person = person.clone();
        new_person.id = *next_id;
        *next_id += 1;

        let id = new_person.id;
        persons.insert(id, new_person);
        Ok(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: i64,
    pub text: String,
}

/// Mock messaging gateway that records every send attempt
#[derive(Debug, Clone)]
pub struct MockMessagingGateway {
    attempts: Arc<Mutex<Vec<SentMessage>>>,
    should_fail: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockMessagingGateway {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(AtomicBool::new(false)),
            delay: Arc::new(Mutex::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        let gateway = Self::new();
        gateway.set_should_fail(true);
        gateway
    }

    pub fn with_delay(delay: Duration) -> Self {
        let gateway = Self::new();
        gateway.set_delay(Some(delay));
        gateway
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.attempts.lock().unwrap().clone()
    }

    /// Highest number of sends observed running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockMessagingGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingGateway for MockMessagingGateway {
    async fn send(&self, recipient: i64, text: &str) -> CrmResult<()> {
        self.attempts.lock().unwrap().push(SentMessage {
            recipient,
            text: text.to_string(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(CrmError::messaging("mock gateway failure"));
        }
        Ok(())
    }
}
