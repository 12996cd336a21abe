//! Command-line interface for chatsweep.
//!
//! This crate wires configuration, logging and the export pipeline into the
//! `chatsweep` binary.

#![deny(missing_docs, unsafe_code)]

/// CLI command definitions and parsing.
pub mod commands;

/// CLI application entry point and configuration.
pub mod app;

/// Error types for CLI operations.
pub mod error;
