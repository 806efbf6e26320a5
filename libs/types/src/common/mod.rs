//! Shared error types
pub mod errors;

pub use errors::{DomainError, ErrorInfo, ValidationError};
