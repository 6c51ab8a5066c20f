pub mod database;
pub mod error_handling;
pub mod messaging;

pub use database::*;
pub use messaging::*;
