//! Common error types for Tartan

use thiserror::Error;

/// Common result type for Tartan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Tartan services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Feature set could not be reduced to a canonical fingerprint input
    #[error("Fingerprint input error: {0}")]
    FingerprintInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
