//! Common error types for VSR

use thiserror::Error;

/// Common result type for VSR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across VSR crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON payload (report, sample fields)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
