//! Bounded-concurrency fan-out of account exports.

use crate::client::RemoteChatClient;
use crate::error::HarvestResult;
use crate::events::{emit, PipelineEvent};
use crate::exporter::{ConversationExporter, ExportContext};
use chatsweep_core::{AccountOutcome, Credential, RunSummary, SweepConfig};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Builds a fresh client for every account so no session state is shared.
pub type ClientFactory = Arc<dyn Fn() -> HarvestResult<RemoteChatClient> + Send + Sync>;

/// Runs one export per account with at most `concurrency` running at once.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool. A limit of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Concurrency bound.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Client factory backed by the run configuration.
    pub fn config_factory(config: &SweepConfig) -> ClientFactory {
        let config = config.clone();
        Arc::new(move || RemoteChatClient::from_config(&config))
    }

    /// Export every account and collect one outcome per account, in the
    /// order the accounts were given.
    ///
    /// Only failure to create the output directory is returned as an error;
    /// every per-account failure, including a panic, becomes a failed
    /// outcome.
    pub async fn run(
        &self,
        accounts: Vec<Credential>,
        ctx: Arc<ExportContext>,
        factory: ClientFactory,
    ) -> HarvestResult<RunSummary> {
        tokio::fs::create_dir_all(&ctx.output_dir).await?;
        info!(
            "Exporting {} account(s) with concurrency {}",
            accounts.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let names: Vec<String> = accounts.iter().map(|c| c.identifier.clone()).collect();
        let mut set = JoinSet::new();

        for (position, credential) in accounts.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let ctx = Arc::clone(&ctx);
            let factory = Arc::clone(&factory);

            set.spawn(async move {
                let account = credential.identifier.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            position,
                            AccountOutcome::failed(account, "worker pool closed"),
                        )
                    }
                };

                let running = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);
                emit(
                    ctx.events.as_ref(),
                    PipelineEvent::AccountStarted {
                        account: account.clone(),
                    },
                );

                let outcome = AssertUnwindSafe(run_account(&credential, &ctx, &factory))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        error!("Account task for {} panicked", account);
                        AccountOutcome::failed(
                            account.as_str(),
                            format!("account task panicked: {}", panic_message(panic.as_ref())),
                        )
                    });

                active.fetch_sub(1, Ordering::SeqCst);
                emit(
                    ctx.events.as_ref(),
                    PipelineEvent::AccountFinished(outcome.clone()),
                );
                (position, outcome)
            });
        }

        let mut slots: Vec<Option<AccountOutcome>> = vec![None; names.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((position, outcome)) => slots[position] = Some(outcome),
                Err(err) => error!("Account task did not complete: {}", err),
            }
        }

        let outcomes: Vec<AccountOutcome> = slots
            .into_iter()
            .zip(names)
            .map(|(slot, name)| {
                slot.unwrap_or_else(|| AccountOutcome::failed(name, "account task was cancelled"))
            })
            .collect();

        let summary = RunSummary::from_outcomes(
            outcomes,
            peak.load(Ordering::SeqCst),
            ctx.sink.location().map(Path::to_path_buf),
        );
        info!(
            "Done. success={}, failed={}",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }
}

async fn run_account(
    credential: &Credential,
    ctx: &ExportContext,
    factory: &ClientFactory,
) -> AccountOutcome {
    let client = match (factory.as_ref())() {
        Ok(client) => client,
        Err(err) => {
            return AccountOutcome::failed(
                credential.identifier.as_str(),
                format!("client setup failed: {}", err),
            )
        }
    };
    ConversationExporter::new(&client, ctx).run(credential).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
