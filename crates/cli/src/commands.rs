//! CLI command definitions for chatsweep.
//!
//! Provides the live export pipeline, the offline scanner and message store
//! queries.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI application.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging verbosity
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, default_value_t = false, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "CHATSWEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export every conversation of every account
    Fetch(FetchArgs),

    /// Scan previously exported files for patterns
    Scan(ScanArgs),

    /// Search the message store with a regular expression
    DbSearch(DbSearchArgs),

    /// Write a configuration file with default settings
    InitConfig(InitConfigArgs),
}

/// Live export arguments.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Credential file, one `identifier:secret` per line
    #[arg(short, long, default_value = "accounts.txt")]
    pub accounts: PathBuf,

    /// Pattern file, one regex per line
    #[arg(short, long)]
    pub patterns: Option<PathBuf>,

    /// Maximum number of accounts exported at once
    #[arg(short = 't', long = "threads")]
    pub concurrency: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scan messages for patterns while fetching
    #[arg(long, default_value_t = false)]
    pub live_search: bool,

    /// Save every message into the SQLite store
    #[arg(long, default_value_t = false)]
    pub save_db: bool,

    /// Pause after each conversation, in milliseconds
    #[arg(long)]
    pub rate_delay_ms: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries after the first attempt of each call
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// HTTP(S) proxy URL for all requests
    #[arg(long, env = "CHATSWEEP_PROXY")]
    pub proxy: Option<String>,

    /// Base URL of the chat service
    #[arg(long, env = "CHATSWEEP_BASE_URL")]
    pub base_url: Option<String>,

    /// Match log path (defaults to `<output>/matches.jsonl`)
    #[arg(long)]
    pub matches_out: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, default_value_t = false)]
    pub insecure: bool,

    /// Summary format
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Offline scan arguments.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan (defaults to the output directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Pattern file, one regex per line
    #[arg(short, long)]
    pub patterns: Option<PathBuf>,

    /// Offline match log path (defaults to `<root>/offline_matches.jsonl`)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Do not write an offline match log
    #[arg(long, default_value_t = false)]
    pub no_log: bool,

    /// Result format
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Message store search arguments.
#[derive(Args, Debug)]
pub struct DbSearchArgs {
    /// Regular expression, matched case-insensitively
    pub pattern: String,

    /// Database path (defaults to `<output>/messages.db`)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Result format
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Configuration file creation arguments.
#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Destination (defaults to `--config`, then the user config directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Base URL of the chat service to record in the file
    #[arg(long)]
    pub base_url: Option<String>,

    /// Overwrite an existing file
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
