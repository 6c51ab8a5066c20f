//! # CRM Testing Utils
//!
//! Shared testing utilities for the personal CRM workspace: in-memory
//! repository and gateway mocks, entity builders, a PostgreSQL test
//! container and polling helpers.
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! crm-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod containers;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use containers::*;
pub use helpers::*;
pub use mocks::*;
