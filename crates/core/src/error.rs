//! Core Error Types
//!
//! Error types shared across the Blogger Flow workspace. Kept dependency-light
//! (thiserror + std) so the core crate stays a pure domain library.
//!
//! The application crate wraps these in its own `AppError` together with
//! storage and chat transport failures.

use thiserror::Error;

/// Core error type for domain-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Input that fails a domain rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// Text that could not be parsed into a domain value
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
