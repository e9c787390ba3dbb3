//! Error types for imbalance bar extraction.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for imbalance bar extraction.
#[derive(Error, Debug)]
pub enum Error {
    /// A tick failed validation (non-finite price, negative volume, time going backwards).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Degenerate configuration (zero windows, zero initial expected ticks, unknown metric).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A continuation state does not belong to the stream it was passed to.
    #[error("Continuation mismatch: {0}")]
    ContinuationMismatch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Create a continuation mismatch error.
    pub fn continuation_mismatch(msg: impl Into<String>) -> Self {
        Error::ContinuationMismatch(msg.into())
    }
}
