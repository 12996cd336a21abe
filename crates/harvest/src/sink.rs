//! Append-only match log shared by every account task.

use crate::error::{HarvestError, HarvestResult};
use chatsweep_core::MatchRecord;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Destination for live match records.
///
/// Implementations must make each `append` atomic with respect to concurrent
/// callers: a record is either fully written or not at all, and records never
/// interleave.
pub trait MatchSink: Send + Sync {
    /// Append one record.
    fn append(&self, record: &MatchRecord) -> HarvestResult<()>;

    /// Where records end up, if they are persisted.
    fn location(&self) -> Option<&Path>;
}

/// JSON Lines file guarded by a mutex. One record per line.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Create (or truncate) the log at `path`, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> HarvestResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Serialize `record` and append it as one line, flushing before the
    /// lock is released.
    pub fn append_record<T: Serialize>(&self, record: &T) -> HarvestResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| HarvestError::Internal("match log lock poisoned".to_string()))?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MatchSink for JsonlSink {
    fn append(&self, record: &MatchRecord) -> HarvestResult<()> {
        self.append_record(record)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-memory sink, handy for embedding the pipeline without a log file.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<MatchRecord>>,
}

impl MemorySink {
    /// Snapshot of every record appended so far.
    pub fn records(&self) -> Vec<MatchRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl MatchSink for MemorySink {
    fn append(&self, record: &MatchRecord) -> HarvestResult<()> {
        self.records
            .lock()
            .map_err(|_| HarvestError::Internal("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        None
    }
}
