//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    /// Authoritative remote tier; disabled when `DATABASE_URL` is unset
    pub database: Option<DatabaseConfig>,
    /// Distributed cache tier; disabled when `REDIS_URL` is unset
    pub redis: Option<RedisConfig>,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub webhook: WebhookConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Health surface bind address
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
    /// TTL of the credential mirror kept in Redis
    #[serde(default = "default_credential_ttl")]
    pub credential_ttl_secs: u64,
}

/// Local filesystem layout
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Root directory of the per-tenant credential folders
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    /// Registry metadata file, rewritten wholesale on every mutation
    #[must_use]
    pub fn records_file(&self) -> PathBuf {
        self.data_dir.join("instances.json")
    }
}

/// Per-session connection policy
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
    /// Sends are rejected for this long after the socket opens
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,
    /// Sends allowed per rolling 60 second window
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

/// Outbound webhook delivery policy
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// When set, recovered sessions get `<base>/<tenantId>` as their webhook
    pub base_url: Option<String>,
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_webhook_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_webhook_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl_secs: u64,
    #[serde(default = "default_dedup_sweep")]
    pub dedup_sweep_secs: u64,
}

impl WebhookConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            grace_period_ms: default_grace_period_ms(),
            watchdog_interval_secs: default_watchdog_interval(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_webhook_timeout_ms(),
            max_retries: default_webhook_max_retries(),
            retry_base_ms: default_webhook_retry_base_ms(),
            dedup_ttl_secs: default_dedup_ttl(),
            dedup_sweep_secs: default_dedup_sweep(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "relay-gateway".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_credential_ttl() -> u64 {
    30 * 24 * 60 * 60 // 30 days
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_reconnect_base_ms() -> u64 {
    2_000
}

fn default_reconnect_cap_ms() -> u64 {
    60_000
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

fn default_grace_period_ms() -> u64 {
    3_000
}

fn default_watchdog_interval() -> u64 {
    30
}

fn default_rate_limit() -> u32 {
    30
}

fn default_webhook_timeout_ms() -> u64 {
    10_000
}

fn default_webhook_max_retries() -> u32 {
    3
}

fn default_webhook_retry_base_ms() -> u64 {
    1_000
}

fn default_dedup_ttl() -> u64 {
    300 // 5 minutes
}

fn default_dedup_sweep() -> u64 {
    60
}

/// Read an optional variable, failing only when it is present but unparsable
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let env = match non_empty_var("APP_ENV") {
            Some(raw) => Environment::parse(&raw)
                .ok_or(ConfigError::InvalidValue("APP_ENV", raw))?,
            None => default_env(),
        };

        let database = match non_empty_var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_max_connections),
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or_else(default_min_connections),
            }),
            None => None,
        };

        let redis = match non_empty_var("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: parse_var("REDIS_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_redis_max_connections),
                credential_ttl_secs: parse_var("REDIS_CREDENTIAL_TTL_SECS")?
                    .unwrap_or_else(default_credential_ttl),
            }),
            None => None,
        };

        let config = Self {
            app: AppSettings {
                name: non_empty_var("APP_NAME").unwrap_or_else(default_app_name),
                env,
            },
            gateway: ServerConfig {
                host: non_empty_var("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parse_var("GATEWAY_PORT")?.unwrap_or_else(default_port),
            },
            database,
            redis,
            storage: StorageConfig {
                data_dir: non_empty_var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_data_dir),
            },
            session: SessionConfig {
                reconnect_base_ms: parse_var("RECONNECT_BASE_MS")?
                    .unwrap_or_else(default_reconnect_base_ms),
                reconnect_cap_ms: parse_var("RECONNECT_CAP_MS")?
                    .unwrap_or_else(default_reconnect_cap_ms),
                reconnect_max_attempts: parse_var("RECONNECT_MAX_ATTEMPTS")?
                    .unwrap_or_else(default_reconnect_max_attempts),
                grace_period_ms: parse_var("SEND_GRACE_PERIOD_MS")?
                    .unwrap_or_else(default_grace_period_ms),
                watchdog_interval_secs: parse_var("WATCHDOG_INTERVAL_SECS")?
                    .unwrap_or_else(default_watchdog_interval),
                rate_limit_per_minute: parse_var("RATE_LIMIT_PER_MINUTE")?
                    .unwrap_or_else(default_rate_limit),
            },
            webhook: WebhookConfig {
                base_url: non_empty_var("WEBHOOK_BASE_URL"),
                timeout_ms: parse_var("WEBHOOK_TIMEOUT_MS")?
                    .unwrap_or_else(default_webhook_timeout_ms),
                max_retries: parse_var("WEBHOOK_MAX_RETRIES")?
                    .unwrap_or_else(default_webhook_max_retries),
                retry_base_ms: parse_var("WEBHOOK_RETRY_BASE_MS")?
                    .unwrap_or_else(default_webhook_retry_base_ms),
                dedup_ttl_secs: parse_var("WEBHOOK_DEDUP_TTL_SECS")?
                    .unwrap_or_else(default_dedup_ttl),
                dedup_sweep_secs: parse_var("WEBHOOK_DEDUP_SWEEP_SECS")?
                    .unwrap_or_else(default_dedup_sweep),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would make the session policy meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.rate_limit_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_PER_MINUTE",
                "must be greater than zero".to_string(),
            ));
        }
        if self.session.reconnect_cap_ms < self.session.reconnect_base_ms {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_CAP_MS",
                format!(
                    "{} is below RECONNECT_BASE_MS ({})",
                    self.session.reconnect_cap_ms, self.session.reconnect_base_ms
                ),
            ));
        }
        if self.session.watchdog_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "WATCHDOG_INTERVAL_SECS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.webhook.dedup_sweep_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "WEBHOOK_DEDUP_SWEEP_SECS",
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
