//! Test data builders
//!
//! Builders start from sensible defaults so tests only spell out the
//! fields they care about.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use crm_domain::entities::{
    ContactInfo, JobInfo, Notification, NotificationStatus, NotificationType, Person,
    PersonSettings,
};

/// Builder for Notification entities
pub struct NotificationBuilder {
    notification: Notification,
}

impl NotificationBuilder {
    /// A pending keep-in-touch notification for person 1, due a minute ago
    pub fn new() -> Self {
        Self {
            notification: Notification {
                id: 1,
                person_id: 1,
                notification_type: NotificationType::KeepInTouch,
                status: NotificationStatus::Pending,
                notification_time: Utc::now() - Duration::minutes(1),
                description: "test notification".to_string(),
                claimed_at: None,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.notification.id = id;
        self
    }

    pub fn with_person_id(mut self, person_id: i64) -> Self {
        self.notification.person_id = person_id;
        self
    }

    pub fn with_status(mut self, status: NotificationStatus) -> Self {
        self.notification.status = status;
        self
    }

    pub fn with_notification_time(mut self, notification_time: DateTime<Utc>) -> Self {
        self.notification.notification_time = notification_time;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.notification.description = description.to_string();
        self
    }

    /// Not yet due: scheduled `offset` into the future
    pub fn due_in(mut self, offset: Duration) -> Self {
        self.notification.notification_time = Utc::now() + offset;
        self
    }

    pub fn claimed_at(mut self, claimed_at: DateTime<Utc>) -> Self {
        self.notification.status = NotificationStatus::Dispatching;
        self.notification.claimed_at = Some(claimed_at);
        self
    }

    pub fn build(self) -> Notification {
        self.notification
    }
}

impl Default for NotificationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for Person entities
pub struct PersonBuilder {
    person: Person,
}

impl PersonBuilder {
    /// John Smith with id 1
    pub fn new() -> Self {
        Self {
            person: Person {
                id: 1,
                first_name: "John".to_string(),
                last_name: Some("Smith".to_string()),
                second_name: None,
                birth_date: None,
                contact_infos: Vec::new(),
                job_infos: Vec::new(),
                settings: PersonSettings::default(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.person.id = id;
        self
    }

    pub fn with_first_name(mut self, first_name: &str) -> Self {
        self.person.first_name = first_name.to_string();
        self
    }

    pub fn with_last_name(mut self, last_name: &str) -> Self {
        self.person.last_name = Some(last_name.to_string());
        self
    }

    pub fn without_last_name(mut self) -> Self {
        self.person.last_name = None;
        self
    }

    pub fn with_second_name(mut self, second_name: &str) -> Self {
        self.person.second_name = Some(second_name.to_string());
        self
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.person.birth_date = Some(birth_date);
        self
    }

    pub fn with_contact(mut self, method: &str, data: &str) -> Self {
        self.person.contact_infos.push(ContactInfo {
            method: method.to_string(),
            data: data.to_string(),
        });
        self
    }

    pub fn with_job(mut self, company: &str, position: &str, current: bool) -> Self {
        self.person.job_infos.push(JobInfo {
            company: company.to_string(),
            position: position.to_string(),
            current,
        });
        self
    }

    pub fn with_birthday_notify(mut self, birthday_notify: bool) -> Self {
        self.person.settings.birthday_notify = birthday_notify;
        self
    }

    pub fn build(self) -> Person {
        self.person
    }
}

impl Default for PersonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
