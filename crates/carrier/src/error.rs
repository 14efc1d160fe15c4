use thiserror::Error;

/// Transport-level errors talking to a carrier.
///
/// Provider-reported rejections are not errors; they come back as
/// unsuccessful [`crate::CarrierResponse`] values.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// The HTTP request itself failed (connect, timeout, TLS, ...).
    #[error("Carrier HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The carrier broke its own protocol, e.g. a success response
    /// without a payload.
    #[error("Carrier protocol violation: {0}")]
    Protocol(String),

    /// The carrier response body could not be decoded.
    #[error("Carrier response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for carrier operations.
pub type Result<T> = std::result::Result<T, CarrierError>;
