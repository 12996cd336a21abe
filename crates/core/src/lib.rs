//! Core types, errors, and configuration for chatsweep.
//!
//! This crate holds everything that is shared between the live export
//! pipeline and the offline scanner: the account/conversation/message data
//! model, credential and pattern loading, filename sanitizing, and the
//! run configuration.

pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod naming;
pub mod patterns;
pub mod types;

// Re-exports for convenience
pub use config::SweepConfig;
pub use credentials::{load_credentials, parse_credentials, Credential};
pub use error::{Error, Result};
pub use patterns::PatternSet;
pub use types::*;
