//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Webhook delivery configuration.
    #[serde(default)]
    pub webhooks: WebhookDispatchConfig,
    /// Execution history retention configuration.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Administrative API access.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Outbound webhook delivery tuning.
///
/// The retry constants are operational knobs; the engine only assumes
/// `max_attempts >= 1` and `backoff_base_ms <= backoff_max_ms`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookDispatchConfig {
    /// Per-attempt request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per subscription, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds. Doubles on each retry.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound for a single backoff delay, in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Maximum concurrent sends when fanning out one event.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Response bodies longer than this are truncated before being stored.
    #[serde(default = "default_max_response_body_bytes")]
    pub max_response_body_bytes: usize,
}

impl Default for WebhookDispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_concurrency: default_max_concurrency(),
            max_response_body_bytes: default_max_response_body_bytes(),
        }
    }
}

/// Execution history retention.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Whether the retention job runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// History rows older than this many days are deleted.
    #[serde(default = "default_keep_days")]
    pub keep_days: u32,
    /// Seconds between two retention runs.
    #[serde(default = "default_retention_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_days: default_keep_days(),
            interval_secs: default_retention_interval_secs(),
        }
    }
}

/// Administrative API configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// API keys accepted as `Authorization: Bearer <key>`.
    #[serde(default)]
    pub api_keys: Vec<AdminApiKey>,
}

/// A named administrative API key.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminApiKey {
    /// Identity recorded as the actor for requests made with this key.
    pub name: String,
    /// Secret key value.
    pub key: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_backoff_base_ms() -> u64 {
    2_000
}

const fn default_backoff_max_ms() -> u64 {
    30_000
}

const fn default_max_concurrency() -> usize {
    10
}

const fn default_max_response_body_bytes() -> usize {
    4096
}

const fn default_keep_days() -> u32 {
    90
}

const fn default_retention_interval_secs() -> u64 {
    86_400
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, only to populate the environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `BACKOFFICE_ENV`)
    /// 4. Environment variables with `BACKOFFICE__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("BACKOFFICE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BACKOFFICE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BACKOFFICE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
