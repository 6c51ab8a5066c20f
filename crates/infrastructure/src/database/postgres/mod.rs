pub mod postgres_notification_repository;
pub mod postgres_person_repository;

pub use postgres_notification_repository::PostgresNotificationRepository;
pub use postgres_person_repository::PostgresPersonRepository;
