pub mod sqlite_notification_repository;
pub mod sqlite_person_repository;

pub use sqlite_notification_repository::SqliteNotificationRepository;
pub use sqlite_person_repository::SqlitePersonRepository;
