//! Error types for account export and scanning.

use thiserror::Error;

/// Main error type for harvest operations.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// I/O error (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Every login payload shape exhausted its retries
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration, credential or pattern error from the core crate
    #[error(transparent)]
    Core(#[from] chatsweep_core::Error),

    /// Invariant violation inside the pipeline
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias for harvest operations.
pub type HarvestResult<T> = Result<T, HarvestError>;
