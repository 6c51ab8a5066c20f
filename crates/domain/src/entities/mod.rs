pub mod notification;
pub mod person;

pub use notification::{Notification, NotificationStatus, NotificationType};
pub use person::{ContactInfo, JobInfo, Person, PersonSettings};
