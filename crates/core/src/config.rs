use crate::constants::*;
use crate::Error;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for chatsweep.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SweepConfig {
    /// Remote chat service endpoints.
    pub remote: RemoteConfig,

    /// HTTP transport and retry configuration.
    pub http: HttpConfig,

    /// Worker pool configuration.
    pub pool: PoolConfig,

    /// Output locations.
    pub output: OutputConfig,

    /// Pattern search configuration.
    pub search: SearchConfig,

    /// Message store configuration.
    pub store: StoreConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Remote chat service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Scheme and host of the service, e.g. `https://chat.example.com`.
    pub base_url: Option<String>,

    /// Login endpoint path.
    pub login_path: String,

    /// Conversation listing endpoint path.
    pub list_path: String,

    /// Conversation history endpoint path.
    pub history_path: String,

    /// User agent header value.
    pub user_agent: String,
}

/// HTTP transport and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after the first attempt of every call.
    pub max_retries: u32,

    /// Fixed part of the linear backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Per-attempt increment of the linear backoff in milliseconds.
    pub backoff_step_ms: u64,

    /// Optional HTTP(S) proxy applied to every request.
    pub proxy: Option<String>,

    /// Verify TLS certificates.
    pub verify_tls: bool,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of accounts exported at once.
    pub concurrency: usize,

    /// Pause after each conversation, in milliseconds.
    pub rate_delay_ms: u64,
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base directory for exports, logs and the message store.
    pub dir: PathBuf,

    /// Override for the match log path.
    pub matches_out: Option<PathBuf>,
}

/// Pattern search configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// Scan messages as they are fetched.
    pub live: bool,

    /// Pattern file path.
    pub patterns: Option<PathBuf>,
}

/// Message store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Persist every fetched message into `messages.db`.
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
}

impl SweepConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatsweep").join("config.toml"))
    }

    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Parse(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))
    }

    /// Check settings shared by every run mode.
    pub fn validate(&self) -> Result<()> {
        if self.pool.concurrency == 0 {
            return Err(Error::validation("pool.concurrency must be at least 1"));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::validation("http.timeout_secs must be at least 1"));
        }
        if let Some(proxy) = &self.http.proxy {
            if !(proxy.starts_with("http://") || proxy.starts_with("https://")) {
                return Err(Error::validation(format!(
                    "unsupported proxy url: {}",
                    proxy
                )));
            }
        }
        Ok(())
    }

    /// Check settings required to contact the remote service.
    pub fn validate_for_fetch(&self) -> Result<()> {
        self.validate()?;
        match self.remote.base_url.as_deref().map(str::trim) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
            Some(url) => Err(Error::validation(format!(
                "remote.base_url must be an http(s) url, got `{}`",
                url
            ))),
            None => Err(Error::validation("remote.base_url is required for fetching")),
        }
    }

    /// Match log path: the override if set, else `<output>/matches.jsonl`.
    pub fn match_log_path(&self) -> PathBuf {
        self.output
            .matches_out
            .clone()
            .unwrap_or_else(|| self.output.dir.join(MATCH_LOG_FILE))
    }

    /// Message store path under the output directory.
    pub fn message_db_path(&self) -> PathBuf {
        self.output.dir.join(MESSAGE_DB_FILE)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            list_path: DEFAULT_LIST_PATH.to_string(),
            history_path: DEFAULT_HISTORY_PATH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_step_ms: DEFAULT_BACKOFF_STEP_MS,
            proxy: None,
            verify_tls: true,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            rate_delay_ms: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            matches_out: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: SweepConfig = toml::from_str(
            r#"
            [remote]
            base_url = "https://chat.example.com"

            [pool]
            concurrency = 8
            "#,
        )
        .expect("parse");
        assert_eq!(config.pool.concurrency, 8);
        assert_eq!(config.http.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.remote.login_path, DEFAULT_LOGIN_PATH);
        assert!(config.validate_for_fetch().is_ok());
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let mut config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.validate_for_fetch().is_err());

        config.remote.base_url = Some("ftp://example.com".to_string());
        assert!(config.validate_for_fetch().is_err());

        config.remote.base_url = Some("https://example.com".to_string());
        config.pool.concurrency = 0;
        assert!(config.validate_for_fetch().is_err());

        config.pool.concurrency = 1;
        config.http.proxy = Some("127.0.0.1:8080".to_string());
        assert!(config.validate().is_err());

        config.http.proxy = Some("http://127.0.0.1:8080".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn socks_proxies_are_rejected() {
        let mut config = SweepConfig::default();
        config.http.proxy = Some("socks5://127.0.0.1:1080".to_string());
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn match_log_defaults_under_output_dir() {
        let mut config = SweepConfig::default();
        config.output.dir = PathBuf::from("out");
        assert_eq!(config.match_log_path(), PathBuf::from("out").join(MATCH_LOG_FILE));

        config.output.matches_out = Some(PathBuf::from("elsewhere.jsonl"));
        assert_eq!(config.match_log_path(), PathBuf::from("elsewhere.jsonl"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = SweepConfig::default();
        config.remote.base_url = Some("https://chat.example.com".to_string());
        config.search.live = true;
        config.save(&path).expect("save");

        let loaded = SweepConfig::load(&path).expect("load");
        assert!(loaded.search.live);
        assert_eq!(loaded.remote.base_url, config.remote.base_url);
    }
}
