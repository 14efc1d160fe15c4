use thiserror::Error;

/// Errors raised by domain entities.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A contract violation by the caller (programmer error, fail fast).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An order's final amount does not match its parts.
    #[error("Order amount mismatch: expected {expected}, actual {actual}")]
    AmountMismatch { expected: i64, actual: i64 },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
