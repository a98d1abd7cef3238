//! Shared domain types, error taxonomy, and configuration for dealdesk.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::customer::{CustomerId, CustomerMatch};
pub use domain::deal::DealRecord;
pub use errors::{ApplicationError, DomainError, InterfaceError};
