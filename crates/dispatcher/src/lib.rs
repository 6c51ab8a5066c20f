pub mod dispatcher;
pub mod message;
pub mod recovery_service;
pub mod scheduler;

pub use dispatcher::{DispatchError, DispatchOutcome, NotificationDispatcher};
pub use message::render_message;
pub use recovery_service::ClaimRecoveryService;
pub use scheduler::{NotificationScheduler, TickReport};
