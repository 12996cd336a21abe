use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// A server-side conversation as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Opaque, server-assigned conversation ID.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Conversation title, if the server has one.
    #[serde(default)]
    pub title: Option<String>,

    /// Remaining server fields, kept so the audit index matches the response.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Conversation {
    /// Create a conversation with no extra fields.
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: id.into(),
            title,
            extra: serde_json::Map::new(),
        }
    }

    /// Title used for display and file names; falls back to the ID.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.id,
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role (`USER`, `ASSISTANT`, ...). `null` reads as empty.
    #[serde(default, deserialize_with = "string_or_empty")]
    pub role: String,

    /// Message text.
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub content: Option<String>,

    /// Server timestamp, rendered as text.
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub inserted_at: Option<String>,

    /// Server message ID. Anything that is not an integer reads as absent.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub message_id: Option<i64>,
}

impl Message {
    /// Message text with absence normalized to an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Timestamp text, empty when absent.
    pub fn timestamp(&self) -> &str {
        self.inserted_at.as_deref().unwrap_or_default()
    }
}

/// A live pattern match, one line of the match log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Account identifier the message was fetched for.
    #[serde(rename = "username")]
    pub account: String,

    /// Conversation the message belongs to.
    #[serde(rename = "chat_id")]
    pub conversation_id: String,

    /// Pattern source text.
    pub pattern: String,

    /// Server message ID, when present.
    pub message_id: Option<i64>,

    /// Start of the message content, truncated with a marker.
    #[serde(rename = "match_excerpt")]
    pub excerpt: String,
}

/// An offline pattern match, one line of the offline match log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineMatchRecord {
    /// File the match was found in.
    pub file: PathBuf,

    /// Pattern source text.
    pub pattern: String,

    /// Match with surrounding context, newlines collapsed.
    #[serde(rename = "match")]
    pub excerpt: String,
}

/// Counters describing one finished account export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    /// Per-account output folder.
    pub folder: PathBuf,
    /// Conversations returned by the listing call.
    pub conversations: usize,
    /// Conversations whose history fetch exhausted its retries.
    pub failed_fetches: usize,
    /// Conversations whose transcript could not be written.
    pub failed_writes: usize,
    /// Messages written to disk.
    pub messages: usize,
    /// Match records appended for this account.
    pub matches: usize,
}

/// Terminal result of one account task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOutcome {
    pub account: String,
    pub ok: bool,
    pub detail: String,
    pub report: Option<ExportReport>,
}

impl AccountOutcome {
    /// Successful outcome carrying the export counters.
    pub fn succeeded(account: impl Into<String>, report: ExportReport) -> Self {
        Self {
            account: account.into(),
            ok: true,
            detail: format!("exported to {}", report.folder.display()),
            report: Some(report),
        }
    }

    /// Failed outcome with a human readable reason.
    pub fn failed(account: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            ok: false,
            detail: detail.into(),
            report: None,
        }
    }
}

/// Aggregate result of a worker pool run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Highest number of account tasks observed running at once.
    pub peak_concurrency: usize,
    /// Location of the live match log, if one was written.
    pub match_log: Option<PathBuf>,
    pub outcomes: Vec<AccountOutcome>,
}

impl RunSummary {
    /// Build a summary from the collected outcomes.
    pub fn from_outcomes(
        outcomes: Vec<AccountOutcome>,
        peak_concurrency: usize,
        match_log: Option<PathBuf>,
    ) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.ok).count();
        Self {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            peak_concurrency,
            match_log,
            outcomes,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        },
    )
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_string_or_number(deserializer)?.unwrap_or_default())
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        },
    )
}
