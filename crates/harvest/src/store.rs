//! Optional SQLite store of every fetched message.
//!
//! Writes are a best-effort side channel: the exporter ignores insert
//! failures, so nothing here may influence match recording.

use crate::error::{HarvestError, HarvestResult};
use chatsweep_core::constants::DB_SEARCH_EXCERPT_CHARS;
use regex::RegexBuilder;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// One message row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    /// Account identifier.
    pub account: String,
    /// Conversation ID.
    pub chat_id: String,
    /// Server message ID.
    pub message_id: Option<i64>,
    /// Author role.
    pub role: String,
    /// Message text.
    pub content: String,
    /// Server timestamp text.
    pub inserted_at: String,
}

/// Shared destination for message rows.
pub trait MessageStore: Send + Sync {
    /// Insert one row.
    fn insert(&self, row: &MessageRow) -> HarvestResult<()>;
}

/// Row returned by a pattern search over the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Account identifier.
    pub account: String,
    /// Conversation ID.
    pub chat_id: String,
    /// Server message ID.
    pub message_id: Option<i64>,
    /// Author role.
    pub role: String,
    /// First characters of the content.
    pub content_excerpt: String,
}

/// SQLite-backed store sharing one connection between all account tasks.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteMessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMessageStore").finish_non_exhaustive()
    }
}

impl SqliteMessageStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> HarvestResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> HarvestResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> HarvestResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account TEXT,
                chat_id TEXT,
                message_id INTEGER,
                role TEXT,
                content TEXT,
                inserted_at TEXT
            );
            "#,
        )?;
        register_regexp(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Rows whose content matches `pattern` case-insensitively, in insertion
    /// order.
    pub fn search(&self, pattern: &str) -> HarvestResult<Vec<SearchHit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT account, chat_id, message_id, role, content
            FROM messages
            WHERE regexp(?1, content) = 1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![pattern], |row| {
            let content: Option<String> = row.get(4)?;
            Ok(SearchHit {
                account: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                chat_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                message_id: row.get(2)?,
                role: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                content_excerpt: content
                    .unwrap_or_default()
                    .chars()
                    .take(DB_SEARCH_EXCERPT_CHARS)
                    .collect(),
            })
        })?;
        let hits = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    /// Number of stored rows.
    pub fn count(&self) -> HarvestResult<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?)
    }

    fn lock(&self) -> HarvestResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| HarvestError::Internal("message store lock poisoned".to_string()))
    }
}

impl MessageStore for SqliteMessageStore {
    fn insert(&self, row: &MessageRow) -> HarvestResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO messages (account, chat_id, message_id, role, content, inserted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                row.account,
                row.chat_id,
                row.message_id,
                row.role,
                row.content,
                row.inserted_at
            ],
        )?;
        Ok(())
    }
}

/// Register `regexp(pattern, text)`: 1 on a case-insensitive match, 0
/// otherwise. Invalid patterns and NULL text never match.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: String = ctx.get(0)?;
            let text: Option<String> = ctx.get(1)?;
            let matched = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(text.as_deref().unwrap_or_default()))
                .unwrap_or(false);
            Ok(matched)
        },
    )
}
