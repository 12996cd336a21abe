//! Per-account export: authenticate, list, fetch, write, scan.

use crate::client::{Listing, RemoteChatClient};
use crate::error::{HarvestError, HarvestResult};
use crate::events::{emit, EventSender, PipelineEvent};
use crate::sink::MatchSink;
use crate::store::{MessageRow, MessageStore};
use chatsweep_core::constants::{
    CONVERSATION_INDEX_FILE, LIVE_EXCERPT_CHARS, LOGIN_RESPONSE_FILE,
};
use chatsweep_core::naming::{account_folder_name, conversation_file_name, truncate_excerpt};
use chatsweep_core::{
    AccountOutcome, Conversation, Credential, ExportReport, MatchRecord, Message, PatternSet,
};
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Everything an account export shares with the other running exports.
#[derive(Clone)]
pub struct ExportContext {
    /// Base output directory; each account gets a sub-folder.
    pub output_dir: PathBuf,
    /// Compiled search patterns.
    pub patterns: Arc<PatternSet>,
    /// Scan messages as they are fetched.
    pub live_search: bool,
    /// Shared match log.
    pub sink: Arc<dyn MatchSink>,
    /// Optional shared message store.
    pub store: Option<Arc<dyn MessageStore>>,
    /// Pause after each conversation.
    pub rate_delay: Duration,
    /// Optional progress channel.
    pub events: Option<EventSender>,
}

impl ExportContext {
    /// Context with live search off, no store, no delay and no events.
    pub fn new(output_dir: impl Into<PathBuf>, sink: Arc<dyn MatchSink>) -> Self {
        Self {
            output_dir: output_dir.into(),
            patterns: Arc::new(PatternSet::default()),
            live_search: false,
            sink,
            store: None,
            rate_delay: Duration::ZERO,
            events: None,
        }
    }

    /// Enable live scanning with `patterns`.
    pub fn with_live_search(mut self, patterns: Arc<PatternSet>) -> Self {
        self.patterns = patterns;
        self.live_search = true;
        self
    }

    /// Persist every message into `store`.
    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Pause for `delay` after each conversation.
    pub fn with_rate_delay(mut self, delay: Duration) -> Self {
        self.rate_delay = delay;
        self
    }

    /// Report progress on `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }
}

impl fmt::Debug for ExportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportContext")
            .field("output_dir", &self.output_dir)
            .field("patterns", &self.patterns.len())
            .field("live_search", &self.live_search)
            .field("store", &self.store.is_some())
            .field("rate_delay", &self.rate_delay)
            .finish_non_exhaustive()
    }
}

/// Progress of one account through its export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// Nothing attempted yet.
    Init,
    /// Login in flight.
    Authenticating,
    /// Login succeeded.
    Authenticated,
    /// Every login shape exhausted its retries. Terminal.
    AuthFailed,
    /// Listing conversations.
    Listing,
    /// Fetching the conversation at `index` (zero-based) of `total`.
    FetchingConversation {
        /// Position in server order.
        index: usize,
        /// Conversations listed.
        total: usize,
    },
    /// Every conversation processed. Terminal.
    Done,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::AuthFailed => f.write_str("auth failed"),
            Self::Listing => f.write_str("listing"),
            Self::FetchingConversation { index, total } => {
                write!(f, "fetching conversation {}/{}", index + 1, total)
            }
            Self::Done => f.write_str("done"),
        }
    }
}

/// Drives one account's export against an authenticated-capable client.
pub struct ConversationExporter<'a> {
    client: &'a RemoteChatClient,
    ctx: &'a ExportContext,
}

impl<'a> ConversationExporter<'a> {
    /// Create an exporter.
    pub fn new(client: &'a RemoteChatClient, ctx: &'a ExportContext) -> Self {
        Self { client, ctx }
    }

    /// Export one account and fold any failure into its outcome.
    pub async fn run(&self, credential: &Credential) -> AccountOutcome {
        let account = credential.identifier.as_str();
        let mut state = AccountState::Init;
        match self.drive(credential, &mut state).await {
            Ok(report) => {
                info!(
                    "Exported {}: {} conversation(s), {} message(s), {} match(es)",
                    account, report.conversations, report.messages, report.matches
                );
                AccountOutcome::succeeded(account, report)
            }
            Err(err) => {
                warn!("Export failed for {} while {}: {}", account, state, err);
                AccountOutcome::failed(account, format!("{} (while {})", err, state))
            }
        }
    }

    /// Export one account, returning its counters.
    ///
    /// Authentication failure is returned as [`HarvestError::Authentication`]
    /// before anything is written to disk.
    pub async fn export(&self, credential: &Credential) -> HarvestResult<ExportReport> {
        let mut state = AccountState::Init;
        self.drive(credential, &mut state).await
    }

    async fn drive(
        &self,
        credential: &Credential,
        state: &mut AccountState,
    ) -> HarvestResult<ExportReport> {
        let account = credential.identifier.as_str();
        self.transition(account, state, AccountState::Authenticating);

        let session = match self
            .client
            .authenticate(&credential.identifier, &credential.secret)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                self.transition(account, state, AccountState::AuthFailed);
                return Err(err);
            }
        };
        self.transition(account, state, AccountState::Authenticated);

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let folder = self
            .ctx
            .output_dir
            .join(account_folder_name(account, &timestamp));
        tokio::fs::create_dir_all(&folder).await?;
        write_json(&folder.join(LOGIN_RESPONSE_FILE), &session.raw).await?;

        self.transition(account, state, AccountState::Listing);
        let listing = self.client.list_conversations(&session.token).await;
        if let Listing::Failed { error } = &listing {
            warn!("Conversation list for {} unavailable: {}", account, error);
        }
        let conversations = listing.into_items();
        write_json(&folder.join(CONVERSATION_INDEX_FILE), &conversations).await?;

        let mut report = ExportReport {
            folder: folder.clone(),
            conversations: conversations.len(),
            ..ExportReport::default()
        };

        let total = conversations.len();
        for (index, conversation) in conversations.iter().enumerate() {
            self.transition(
                account,
                state,
                AccountState::FetchingConversation { index, total },
            );
            self.export_conversation(account, &session.token, &folder, conversation, &mut report)
                .await?;

            if !self.ctx.rate_delay.is_zero() {
                tokio::time::sleep(self.ctx.rate_delay).await;
            }
        }

        self.transition(account, state, AccountState::Done);
        Ok(report)
    }

    async fn export_conversation(
        &self,
        account: &str,
        token: &str,
        folder: &Path,
        conversation: &Conversation,
        report: &mut ExportReport,
    ) -> HarvestResult<()> {
        let listing = self.client.fetch_conversation(token, &conversation.id).await;
        if listing.is_failed() {
            report.failed_fetches += 1;
        }
        let messages = listing.into_items();

        let mut transcript = String::new();
        for message in &messages {
            append_transcript_entry(&mut transcript, message)?;
            self.store_message(account, &conversation.id, message);
            if self.ctx.live_search {
                report.matches += self.scan_message(account, &conversation.id, message);
            }
        }
        report.messages += messages.len();

        let path = folder.join(conversation_file_name(
            &conversation.id,
            conversation.display_title(),
        ));
        match tokio::fs::write(&path, transcript).await {
            Ok(()) => debug!(
                "Wrote {} message(s) of {} to {}",
                messages.len(),
                conversation.id,
                path.display()
            ),
            Err(err) => {
                report.failed_writes += 1;
                warn!(
                    "Failed to write conversation {} of {} to {}: {}",
                    conversation.id,
                    account,
                    path.display(),
                    err
                );
            }
        }
        Ok(())
    }

    /// Best-effort insert; failures never reach the caller.
    fn store_message(&self, account: &str, chat_id: &str, message: &Message) {
        let Some(store) = &self.ctx.store else {
            return;
        };
        let row = MessageRow {
            account: account.to_string(),
            chat_id: chat_id.to_string(),
            message_id: message.message_id,
            role: message.role.clone(),
            content: message.text().to_string(),
            inserted_at: message.timestamp().to_string(),
        };
        if let Err(err) = store.insert(&row) {
            trace!("Message store insert skipped for {}/{}: {}", account, chat_id, err);
        }
    }

    /// Test every pattern against the message and record each hit. Returns
    /// the number of records appended; only appended records are announced
    /// as events.
    fn scan_message(&self, account: &str, chat_id: &str, message: &Message) -> usize {
        let text = message.text();
        let mut appended = 0;
        for pattern in self.ctx.patterns.matching(text) {
            let record = MatchRecord {
                account: account.to_string(),
                conversation_id: chat_id.to_string(),
                pattern: pattern.source.clone(),
                message_id: message.message_id,
                excerpt: truncate_excerpt(text, LIVE_EXCERPT_CHARS),
            };
            info!(
                "[MATCH][{}] pattern={} chat={} msg={:?}",
                account, record.pattern, chat_id, record.message_id
            );
            match self.ctx.sink.append(&record) {
                Ok(()) => {
                    appended += 1;
                    emit(self.ctx.events.as_ref(), PipelineEvent::Match(record));
                }
                Err(err) => warn!("Failed to append match for {}: {}", account, err),
            }
        }
        appended
    }

    fn transition(&self, account: &str, state: &mut AccountState, next: AccountState) {
        debug!("{}: {} -> {}", account, state, next);
        *state = next;
    }
}

fn append_transcript_entry(out: &mut String, message: &Message) -> HarvestResult<()> {
    write!(
        out,
        "[{}] inserted_at={}\n{}\n\n",
        message.role,
        message.timestamp(),
        message.text()
    )
    .map_err(|e| HarvestError::Internal(e.to_string()))
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> HarvestResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}
