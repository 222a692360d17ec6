//! Configuration management for Sonar Watcher
//!
//! Loads configuration from TOML files and environment variables.
//! Environment variables override file values. Allium credentials may
//! also come from a `~/.allium/credentials` file when the config and
//! environment leave them empty.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Allium API configuration
    pub allium: AlliumConfig,
    /// Request queue configuration
    pub queue: QueueConfig,
    /// Polling engine configuration
    pub poller: PollerConfig,
    /// Notification configuration
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/sonar.db")
}

fn default_max_connections() -> u32 {
    5
}

/// Allium API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AlliumConfig {
    /// API key sent as X-API-KEY (env: SONAR_ALLIUM__API_KEY)
    #[serde(default)]
    pub api_key: String,
    /// Saved Explorer query slot used for run-async SQL
    #[serde(default)]
    pub query_id: String,
    /// Base URL, overridable for tests
    #[serde(default = "default_allium_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_allium_timeout")]
    pub timeout_secs: u64,
    /// Spacing between Explorer query-run status polls (ms)
    #[serde(default = "default_sql_poll_interval")]
    pub sql_poll_interval_ms: u64,
    /// Status polls before a query run is declared timed out
    #[serde(default = "default_sql_max_polls")]
    pub sql_max_poll_attempts: u32,
    /// Read `~/.allium/credentials` when api_key/query_id are empty
    #[serde(default = "default_true")]
    pub credentials_file_fallback: bool,
}

fn default_allium_base_url() -> String {
    crate::constants::allium::BASE_URL.to_string()
}

fn default_allium_timeout() -> u64 {
    30
}

fn default_sql_poll_interval() -> u64 {
    crate::constants::allium::SQL_POLL_INTERVAL_SECS * 1_000
}

fn default_sql_max_polls() -> u32 {
    crate::constants::allium::SQL_MAX_POLL_ATTEMPTS
}

/// Request queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Minimum start-to-start spacing between dispatches (ms)
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    /// Retries granted to a request hitting HTTP 429
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff unit; attempt n sleeps 2^n * this (ms)
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
}

fn default_min_interval() -> u64 {
    crate::constants::allium::MIN_INTERVAL_MS
}

fn default_max_retries() -> u32 {
    crate::constants::allium::MAX_RETRIES
}

fn default_backoff_base() -> u64 {
    crate::constants::allium::BACKOFF_BASE_MS
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
        }
    }
}

/// Polling engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Chain identifier passed verbatim to the provider
    #[serde(default = "default_chain")]
    pub chain: String,
    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Delay before the first cycle after start
    #[serde(default = "default_first_delay")]
    pub first_delay_secs: u64,
    /// Tracked wallet roster JSON
    #[serde(default = "default_roster_path")]
    pub roster_path: PathBuf,
    /// Known protocol contract map JSON
    #[serde(default = "default_contracts_path")]
    pub contracts_path: PathBuf,
    /// Run the seeding pass before the first cycle
    #[serde(default = "default_true")]
    pub warm_up_on_start: bool,
}

fn default_chain() -> String {
    crate::constants::polling::CHAIN.to_string()
}

fn default_poll_interval() -> u64 {
    crate::constants::polling::TX_POLL_INTERVAL_SECS
}

fn default_first_delay() -> u64 {
    crate::constants::polling::FIRST_POLL_DELAY_SECS
}

fn default_roster_path() -> PathBuf {
    PathBuf::from("data/tracked-wallets.json")
}

fn default_contracts_path() -> PathBuf {
    PathBuf::from("data/contracts.json")
}

/// Telegram notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Whether Telegram notifications are enabled
    #[serde(default)]
    pub enabled: bool,
    /// Bot token (env fallback: TELEGRAM_BOT_TOKEN)
    #[serde(default)]
    pub bot_token: String,
    /// Chat ID to send notifications to (env fallback: TELEGRAM_CHAT_ID)
    #[serde(default)]
    pub chat_id: String,
    /// Dashboard URL linked from alert messages
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,
    /// Rate limit in seconds between similar notifications
    #[serde(default = "default_notification_rate_limit")]
    pub rate_limit_seconds: u64,
}

fn default_dashboard_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_notification_rate_limit() -> u64 {
    60
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            dashboard_url: default_dashboard_url(),
            rate_limit_seconds: default_notification_rate_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SONAR_*)
    /// 2. config/config.toml (if exists)
    /// 3. config.toml (if exists)
    /// 4. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "data/sonar.db")?
            .set_default("database.max_connections", 5)?
            .set_default("allium.base_url", crate::constants::allium::BASE_URL)?
            .set_default("allium.timeout_secs", 30)?
            .set_default(
                "queue.min_interval_ms",
                crate::constants::allium::MIN_INTERVAL_MS as i64,
            )?
            .set_default(
                "queue.max_retries",
                crate::constants::allium::MAX_RETRIES as i64,
            )?
            .set_default(
                "queue.backoff_base_ms",
                crate::constants::allium::BACKOFF_BASE_MS as i64,
            )?
            .set_default("poller.chain", crate::constants::polling::CHAIN)?
            .set_default(
                "poller.interval_secs",
                crate::constants::polling::TX_POLL_INTERVAL_SECS as i64,
            )?
            .set_default(
                "poller.first_delay_secs",
                crate::constants::polling::FIRST_POLL_DELAY_SECS as i64,
            )?
            // Load from config files (lower priority)
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // Override with environment variables (highest priority - loaded last)
            // SONAR_SERVER__PORT=3001 -> server.port = 3001
            // SONAR_ALLIUM__API_KEY=... -> allium.api_key = ...
            .add_source(
                Environment::with_prefix("SONAR")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            )
            .build()?;

        let mut cfg: AppConfig = config.try_deserialize()?;
        cfg.apply_env_fallbacks();
        if cfg.allium.credentials_file_fallback {
            cfg.apply_credentials_file();
        }
        Ok(cfg)
    }

    /// Fill Telegram credentials from the bare env vars the original
    /// deployment used when the prefixed form is absent.
    fn apply_env_fallbacks(&mut self) {
        if self.telegram.bot_token.is_empty() {
            if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
                self.telegram.bot_token = token;
            }
        }
        if self.telegram.chat_id.is_empty() {
            if let Ok(chat) = std::env::var("TELEGRAM_CHAT_ID") {
                self.telegram.chat_id = chat;
            }
        }
    }

    /// Fill Allium credentials from `~/.allium/credentials` when empty.
    ///
    /// The file holds `API_KEY=...` and `QUERY_ID=...` lines. Absence is
    /// fine; `validate` decides whether the final values are acceptable.
    fn apply_credentials_file(&mut self) {
        if !self.allium.api_key.is_empty() && !self.allium.query_id.is_empty() {
            return;
        }
        let Ok(home) = std::env::var("HOME") else {
            return;
        };
        let path = PathBuf::from(home).join(".allium").join("credentials");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return;
        };
        let (api_key, query_id) = parse_credentials(&contents);
        if self.allium.api_key.is_empty() {
            if let Some(key) = api_key {
                tracing::debug!(path = %path.display(), "Loaded API key from credentials file");
                self.allium.api_key = key;
            }
        }
        if self.allium.query_id.is_empty() {
            if let Some(id) = query_id {
                self.allium.query_id = id;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Check the API key is set
        if self.allium.api_key.is_empty() {
            return Err(ConfigError::Message(
                "Allium API key must be set via SONAR_ALLIUM__API_KEY or ~/.allium/credentials"
                    .to_string(),
            ));
        }

        // Check the chain is set
        if self.poller.chain.is_empty() {
            return Err(ConfigError::Message("Poller chain must be set".to_string()));
        }

        // Check intervals are non-zero
        if self.poller.interval_secs == 0 {
            return Err(ConfigError::Message(
                "Poller interval must be greater than zero".to_string(),
            ));
        }
        if self.queue.min_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Queue minimum interval must be greater than zero".to_string(),
            ));
        }

        // Telegram needs both halves when enabled
        if self.telegram.enabled
            && (self.telegram.bot_token.is_empty() || self.telegram.chat_id.is_empty())
        {
            return Err(ConfigError::Message(
                "Telegram notifications enabled but bot_token/chat_id missing".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse `API_KEY=` / `QUERY_ID=` lines from a credentials file body.
fn parse_credentials(contents: &str) -> (Option<String>, Option<String>) {
    let mut api_key = None;
    let mut query_id = None;
    for line in contents.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("API_KEY=") {
            if !value.is_empty() {
                api_key = Some(value.to_string());
            }
        } else if let Some(value) = line.strip_prefix("QUERY_ID=") {
            if !value.is_empty() {
                query_id = Some(value.to_string());
            }
        }
    }
    (api_key, query_id)
}
