pub mod manager;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use manager::{DatabaseManager, DatabasePool, DatabaseType};
pub use postgres::{PostgresNotificationRepository, PostgresPersonRepository};
pub use sqlite::{SqliteNotificationRepository, SqlitePersonRepository};
