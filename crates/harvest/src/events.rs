//! Progress events emitted while a run is in flight.

use chatsweep_core::{AccountOutcome, MatchRecord};
use tokio::sync::mpsc;

/// Pipeline events.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// An account task started running.
    AccountStarted {
        /// Account identifier.
        account: String,
    },
    /// A live pattern match was recorded.
    Match(MatchRecord),
    /// An account task produced its terminal outcome.
    AccountFinished(AccountOutcome),
}

/// Sending half handed to exporters.
pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// Receiving half consumed by the caller for progress display.
pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

/// Create an event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send an event if anyone is listening. A dropped receiver is not an error.
pub(crate) fn emit(sender: Option<&EventSender>, event: PipelineEvent) {
    if let Some(sender) = sender {
        let _ = sender.send(event);
    }
}
