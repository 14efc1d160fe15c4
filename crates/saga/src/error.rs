use common::OrderId;
use thiserror::Error;

/// Errors that can escape the saga's public surface.
///
/// Only contract violations and unit-of-work failures propagate; expected
/// business non-events and remote-collaborator failures are logged and
/// absorbed where they occur.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A contract violation by the caller (programmer error, fail fast).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Callback named an order the ledger does not hold.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Ledger store error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),
}

/// Result type for saga operations.
pub type Result<T> = std::result::Result<T, SagaError>;
