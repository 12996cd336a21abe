//! Concurrent multi-account conversation export for chatsweep.
//!
//! This crate provides functionality for:
//! - Calling the remote chat service with a bounded retry/backoff policy
//! - Exporting every conversation of an account to disk
//! - Running many account exports behind a concurrency bound
//! - Recording pattern matches in a shared, append-only match log
//! - Persisting messages into an optional SQLite store
//! - Scanning previously exported files offline

#![deny(missing_docs)]
#![warn(unsafe_code)]

pub mod client;
pub mod error;
pub mod events;
pub mod exporter;
pub mod http;
pub mod offline;
pub mod pool;
pub mod retry;
pub mod sink;
pub mod store;

pub use client::{AuthSession, Listing, RemoteChatClient};
pub use error::{HarvestError, HarvestResult};
pub use exporter::{ConversationExporter, ExportContext};
pub use offline::{OfflineMatch, OfflineScanner};
pub use pool::WorkerPool;
pub use sink::{JsonlSink, MatchSink, MemorySink};
pub use store::{MessageRow, MessageStore, SearchHit, SqliteMessageStore};
