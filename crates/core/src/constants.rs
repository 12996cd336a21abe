//! Application constants and configuration defaults.

/// Default login endpoint path.
pub const DEFAULT_LOGIN_PATH: &str = "/api/v0/users/login";

/// Default conversation listing endpoint path.
pub const DEFAULT_LIST_PATH: &str = "/api/v0/chat_session/fetch_page?lte_cursor.pinned=false";

/// Default conversation history endpoint path. The conversation id is sent
/// as the `chat_session_id` query parameter.
pub const DEFAULT_HISTORY_PATH: &str = "/api/v0/chat/history_messages";

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "chatsweep/0.1";

/// Default per-call HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default fixed part of the linear backoff, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default per-attempt increment of the linear backoff, in milliseconds.
pub const DEFAULT_BACKOFF_STEP_MS: u64 = 1000;

/// Default number of accounts exported concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "exports";

/// Live match log file name under the output directory.
pub const MATCH_LOG_FILE: &str = "matches.jsonl";

/// Offline match log file name under the scanned directory.
pub const OFFLINE_MATCH_LOG_FILE: &str = "offline_matches.jsonl";

/// SQLite message store file name under the output directory.
pub const MESSAGE_DB_FILE: &str = "messages.db";

/// Raw authentication response kept for audit.
pub const LOGIN_RESPONSE_FILE: &str = "login_response.json";

/// Conversation index written before any conversation file.
pub const CONVERSATION_INDEX_FILE: &str = "chats_index.json";

/// Maximum length, in characters, of a sanitized filename component.
pub const MAX_FILENAME_CHARS: usize = 120;

/// Maximum length, in bytes, of any file or folder name we create.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Maximum length, in characters, of a live match excerpt.
pub const LIVE_EXCERPT_CHARS: usize = 200;

/// Characters of context kept on each side of an offline match.
pub const OFFLINE_CONTEXT_CHARS: usize = 80;

/// Maximum length, in characters, of a message store search excerpt.
pub const DB_SEARCH_EXCERPT_CHARS: usize = 300;

/// Marker appended to excerpts that were cut.
pub const TRUNCATION_MARKER: &str = "...";

/// File extensions considered by the offline scanner.
pub const OFFLINE_SCAN_EXTENSIONS: &[&str] = &["txt", "json", "md"];
