//! Error types for chatsweep core functionality.

use thiserror::Error;

/// Main error type for chatsweep core.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Data parsing error: {0}")]
    Parse(String),
    /// A search pattern failed to compile.
    #[error("Invalid pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for chatsweep core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
