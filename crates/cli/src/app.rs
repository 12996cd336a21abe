//! CLI application entry point and configuration.
//!
//! This module provides the main CLI application logic, including argument parsing,
//! configuration loading, and command dispatch.

use crate::commands::{
    Cli, Commands, DbSearchArgs, FetchArgs, InitConfigArgs, OutputFormat, ScanArgs,
};
use crate::error::{CliError, Result};
use chatsweep_core::constants::OFFLINE_MATCH_LOG_FILE;
use chatsweep_core::{load_credentials, OfflineMatchRecord, PatternSet, RunSummary, SweepConfig};
use chatsweep_harvest::events::{self, EventReceiver, PipelineEvent};
use chatsweep_harvest::{
    ExportContext, JsonlSink, MatchSink, MessageStore, OfflineScanner, SqliteMessageStore,
    WorkerPool,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Main CLI application.
#[derive(Debug)]
pub struct App {
    /// Effective configuration, before per-command flag overrides.
    pub config: SweepConfig,
    /// File the configuration was read from, if any.
    pub config_path: Option<PathBuf>,
    /// Parsed CLI arguments.
    pub cli: Cli,
}

impl App {
    /// Create a new application instance from command line arguments.
    pub fn new() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    /// Create an application instance from already parsed arguments.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let (config, config_path) = Self::load_config(&cli)?;
        Ok(Self {
            config,
            config_path,
            cli,
        })
    }

    /// Load configuration from the given file or the default location.
    fn load_config(cli: &Cli) -> Result<(SweepConfig, Option<PathBuf>)> {
        if let Some(config_path) = &cli.config {
            if !config_path.exists() && matches!(cli.command, Commands::InitConfig(_)) {
                return Ok((SweepConfig::default(), None));
            }
            if !config_path.exists() {
                return Err(CliError::Config(format!(
                    "Configuration file not found: {}",
                    config_path.display()
                )));
            }
            let config = SweepConfig::load(config_path)?;
            return Ok((config, Some(config_path.clone())));
        }

        match SweepConfig::default_path() {
            Some(path) if path.exists() => {
                let config = SweepConfig::load(&path)?;
                Ok((config, Some(path)))
            }
            _ => Ok((SweepConfig::default(), None)),
        }
    }

    /// Run the application.
    pub fn run(self) -> Result<()> {
        self.setup_logging();
        if let Some(path) = &self.config_path {
            info!("Using configuration {}", path.display());
        }

        match &self.cli.command {
            Commands::Fetch(args) => self.handle_fetch(args),
            Commands::Scan(args) => self.handle_scan(args),
            Commands::DbSearch(args) => self.handle_db_search(args),
            Commands::InitConfig(args) => self.handle_init_config(args),
        }
    }

    fn setup_logging(&self) {
        let level = log_level(self.cli.quiet, self.cli.verbose, &self.config.logging.level);
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .ok(); // Ignore errors if a subscriber is already installed
    }

    fn handle_fetch(&self, args: &FetchArgs) -> Result<()> {
        let mut config = self.config.clone();
        apply_fetch_overrides(&mut config, args);
        config.validate_for_fetch()?;

        let accounts = load_credentials(&args.accounts)?;
        if accounts.is_empty() {
            warn!("No valid accounts in {}", args.accounts.display());
            println!("No valid accounts found in {}", args.accounts.display());
            return Ok(());
        }

        let patterns = if config.search.live {
            load_live_patterns(config.search.patterns.as_deref())?
        } else {
            PatternSet::default()
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Internal(format!("failed to build runtime: {}", e)))?;

        let summary = runtime.block_on(async move {
            std::fs::create_dir_all(&config.output.dir)?;
            let sink: Arc<dyn MatchSink> = Arc::new(JsonlSink::create(config.match_log_path())?);

            let (tx, rx) = events::channel();
            let mut ctx = ExportContext::new(config.output.dir.clone(), sink)
                .with_rate_delay(Duration::from_millis(config.pool.rate_delay_ms))
                .with_events(tx);
            if config.search.live {
                ctx = ctx.with_live_search(Arc::new(patterns));
            }
            if config.store.enabled {
                ctx = attach_store(ctx, &config.message_db_path());
            }

            let total = accounts.len();
            let progress = tokio::spawn(print_progress(rx, total, args.format));
            let pool = WorkerPool::new(config.pool.concurrency);
            let summary = pool
                .run(accounts, Arc::new(ctx), WorkerPool::config_factory(&config))
                .await?;
            if let Err(err) = progress.await {
                warn!("Progress printer stopped: {}", err);
            }
            Ok::<RunSummary, CliError>(summary)
        })?;

        print_summary(&summary, args.format)
    }

    fn handle_scan(&self, args: &ScanArgs) -> Result<()> {
        let root = args
            .root
            .clone()
            .unwrap_or_else(|| self.config.output.dir.clone());
        let pattern_path = args
            .patterns
            .clone()
            .or_else(|| self.config.search.patterns.clone())
            .ok_or_else(|| CliError::Argument("scan requires --patterns".to_string()))?;
        let patterns = PatternSet::load(&pattern_path)?;
        if patterns.is_empty() {
            return Err(CliError::Argument(format!(
                "no patterns found in {}",
                pattern_path.display()
            )));
        }

        let sink = if args.no_log {
            None
        } else {
            let path = args
                .out
                .clone()
                .unwrap_or_else(|| root.join(OFFLINE_MATCH_LOG_FILE));
            Some(JsonlSink::create(path)?)
        };

        let mut scanner = OfflineScanner::new(&patterns);
        if let Some(sink) = &sink {
            scanner = scanner.with_output(sink);
        }
        let grouped = scanner.scan(&root)?;

        let records: Vec<OfflineMatchRecord> = grouped
            .iter()
            .flat_map(|(file, matches)| {
                matches.iter().map(move |m| OfflineMatchRecord {
                    file: file.clone(),
                    pattern: m.pattern.clone(),
                    excerpt: m.excerpt.clone(),
                })
            })
            .collect();

        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
            OutputFormat::Text => {
                for record in &records {
                    println!(
                        "{}: [{}] ...{}...",
                        record.file.display(),
                        record.pattern,
                        record.excerpt
                    );
                }
                println!(
                    "Scanned {}: {} file(s) with matches, {} match(es)",
                    root.display(),
                    grouped.len(),
                    records.len()
                );
                if let Some(sink) = &sink {
                    println!("Offline matches written to {}", sink.path().display());
                }
            }
        }
        Ok(())
    }

    fn handle_db_search(&self, args: &DbSearchArgs) -> Result<()> {
        let db_path = args
            .db
            .clone()
            .unwrap_or_else(|| self.config.message_db_path());
        if !db_path.exists() {
            return Err(CliError::Config(format!(
                "Message database not found: {}",
                db_path.display()
            )));
        }

        let store = SqliteMessageStore::open(&db_path)?;
        let hits = store.search(&args.pattern)?;

        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
            OutputFormat::Text => {
                for hit in &hits {
                    let message_id = hit
                        .message_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "[{}] chat={} msg={} {}: {}",
                        hit.account, hit.chat_id, message_id, hit.role, hit.content_excerpt
                    );
                }
                println!("{} message(s) matched", hits.len());
            }
        }
        Ok(())
    }
}

impl App {
    fn handle_init_config(&self, args: &InitConfigArgs) -> Result<()> {
        let path = self.init_config(args)?;
        println!("Wrote configuration to {}", path.display());
        Ok(())
    }

    /// Write the effective configuration to the chosen destination and
    /// return where it went.
    pub fn init_config(&self, args: &InitConfigArgs) -> Result<PathBuf> {
        let path = args
            .path
            .clone()
            .or_else(|| self.cli.config.clone())
            .or_else(SweepConfig::default_path)
            .ok_or_else(|| {
                CliError::Config("no configuration directory; pass --path".to_string())
            })?;
        if path.exists() && !args.force {
            return Err(CliError::Config(format!(
                "{} already exists; pass --force to overwrite",
                path.display()
            )));
        }

        let mut config = self.config.clone();
        if let Some(base_url) = &args.base_url {
            config.remote.base_url = Some(base_url.clone());
        }
        config.validate()?;
        config.save(&path)?;
        info!("Saved configuration to {}", path.display());
        Ok(path)
    }
}

/// Fold `fetch` flags over the loaded configuration.
pub fn apply_fetch_overrides(config: &mut SweepConfig, args: &FetchArgs) {
    if let Some(base_url) = &args.base_url {
        config.remote.base_url = Some(base_url.clone());
    }
    if let Some(concurrency) = args.concurrency {
        config.pool.concurrency = concurrency;
    }
    if let Some(rate_delay_ms) = args.rate_delay_ms {
        config.pool.rate_delay_ms = rate_delay_ms;
    }
    if let Some(timeout) = args.timeout {
        config.http.timeout_secs = timeout;
    }
    if let Some(max_retries) = args.max_retries {
        config.http.max_retries = max_retries;
    }
    if let Some(proxy) = &args.proxy {
        config.http.proxy = Some(proxy.clone());
    }
    if args.insecure {
        config.http.verify_tls = false;
    }
    if let Some(output) = &args.output {
        config.output.dir = output.clone();
    }
    if let Some(matches_out) = &args.matches_out {
        config.output.matches_out = Some(matches_out.clone());
    }
    if let Some(patterns) = &args.patterns {
        config.search.patterns = Some(patterns.clone());
    }
    if args.live_search {
        config.search.live = true;
    }
    if args.save_db {
        config.store.enabled = true;
    }
}

/// Log filter for the given flags, falling back to the configured level.
pub fn log_level(quiet: bool, verbose: u8, configured: &str) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn load_live_patterns(path: Option<&Path>) -> Result<PatternSet> {
    let Some(path) = path else {
        warn!("Live search enabled without a pattern file; nothing will be scanned");
        return Ok(PatternSet::default());
    };
    let patterns = PatternSet::load(path)?;
    if patterns.is_empty() {
        warn!("No patterns in {}; nothing will be scanned", path.display());
    } else {
        info!("Loaded {} pattern(s) from {}", patterns.len(), path.display());
    }
    Ok(patterns)
}

/// The store is optional; failing to open it disables it for the run.
fn attach_store(ctx: ExportContext, path: &Path) -> ExportContext {
    match SqliteMessageStore::open(path) {
        Ok(store) => {
            info!("Saving messages to {}", path.display());
            ctx.with_store(Arc::new(store) as Arc<dyn MessageStore>)
        }
        Err(err) => {
            warn!("Message store disabled, cannot open {}: {}", path.display(), err);
            ctx
        }
    }
}

async fn print_progress(mut rx: EventReceiver, total: usize, format: OutputFormat) {
    let mut finished = 0;
    while let Some(event) = rx.recv().await {
        if format != OutputFormat::Text {
            continue;
        }
        match event {
            PipelineEvent::AccountStarted { account } => {
                println!("[{}/{}] {}: started", finished, total, account);
            }
            PipelineEvent::Match(record) => {
                println!(
                    "[MATCH][{}] pattern={} chat={} -> {}",
                    record.account, record.pattern, record.conversation_id, record.excerpt
                );
            }
            PipelineEvent::AccountFinished(outcome) => {
                finished += 1;
                let status = if outcome.ok { "ok" } else { "failed" };
                println!(
                    "[{}/{}] {}: {} ({})",
                    finished, total, outcome.account, status, outcome.detail
                );
            }
        }
    }
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => {
            let location = summary
                .match_log
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "nowhere".to_string());
            println!(
                "Done. success={}, failed={}. matches written to {}",
                summary.succeeded, summary.failed, location
            );
        }
    }
    Ok(())
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let app = App::new()?;
    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_args(argv: &[&str]) -> FetchArgs {
        let mut full = vec!["chatsweep", "fetch"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("parse").command {
            Commands::Fetch(args) => args,
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = SweepConfig::default();
        config.pool.concurrency = 2;
        config.http.max_retries = 5;

        let args = fetch_args(&[
            "-t",
            "9",
            "--max-retries",
            "0",
            "--insecure",
            "--output",
            "out",
            "--live-search",
            "--patterns",
            "p.txt",
        ]);
        apply_fetch_overrides(&mut config, &args);

        assert_eq!(config.pool.concurrency, 9);
        assert_eq!(config.http.max_retries, 0);
        assert!(!config.http.verify_tls);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert_eq!(config.match_log_path(), PathBuf::from("out").join("matches.jsonl"));
        assert!(config.search.live);
        assert_eq!(config.search.patterns, Some(PathBuf::from("p.txt")));
        assert!(!config.store.enabled);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut config = SweepConfig::default();
        config.pool.concurrency = 3;
        config.search.live = true;
        apply_fetch_overrides(&mut config, &fetch_args(&[]));
        assert_eq!(config.pool.concurrency, 3);
        assert!(config.search.live);
    }

    #[test]
    fn verbosity_selects_log_level() {
        assert_eq!(log_level(false, 0, "warn"), "warn");
        assert_eq!(log_level(false, 1, "warn"), "info");
        assert_eq!(log_level(false, 2, "warn"), "debug");
        assert_eq!(log_level(false, 7, "warn"), "trace");
        assert_eq!(log_level(true, 3, "info"), "error");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from([
            "chatsweep",
            "--config",
            "/definitely/not/here/config.toml",
            "scan",
        ])
        .expect("parse");
        let err = App::from_cli(cli).expect_err("missing config");
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn init_config_writes_a_loadable_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conf").join("config.toml");
        let argv = [
            "chatsweep",
            "--config",
            path.to_str().expect("utf8"),
            "init-config",
            "--base-url",
            "https://chat.example.com",
        ];

        let app = App::from_cli(Cli::try_parse_from(argv).expect("parse")).expect("app");
        let Commands::InitConfig(args) = &app.cli.command else {
            panic!("expected init-config");
        };
        assert_eq!(app.init_config(args).expect("write"), path);

        let written = SweepConfig::load(&path).expect("load");
        assert_eq!(written.remote.base_url.as_deref(), Some("https://chat.example.com"));
        assert!(written.validate_for_fetch().is_ok());

        let app = App::from_cli(Cli::try_parse_from(argv).expect("parse")).expect("app");
        let Commands::InitConfig(args) = &app.cli.command else {
            panic!("expected init-config");
        };
        let err = app.init_config(args).expect_err("existing file");
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pool]\nconcurrency = 7\n").expect("write");

        let cli = Cli::try_parse_from(["chatsweep", "--config", path.to_str().expect("utf8"), "scan"])
            .expect("parse");
        let app = App::from_cli(cli).expect("app");
        assert_eq!(app.config.pool.concurrency, 7);
        assert_eq!(app.config_path, Some(path));
    }
}
