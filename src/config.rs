use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Settlement gateway (on/off-ramp) connection settings.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Per-request timeout. No gateway call may block indefinitely.
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
    /// Settlement network the platform wallets live on.
    #[serde(default = "default_network")]
    pub network: String,
    /// Custodial settlement asset.
    #[serde(default = "default_crypto_currency")]
    pub crypto_currency: String,
    /// Token contract address on the settlement network.
    #[serde(default)]
    pub token_address: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gateway.invalid".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            timeout_secs: default_gateway_timeout_secs(),
            network: default_network(),
            crypto_currency: default_crypto_currency(),
            token_address: String::new(),
        }
    }
}

/// Outbound messaging-channel provider settings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
    /// Global fallback sender when a store has no channel of its own.
    #[serde(default)]
    pub phone_number_id: String,
    /// Shared secret for inbound webhook signature verification. Verification
    /// is skipped when unset (local development only).
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Application configuration. Loaded from `config/default.toml`, an optional
/// per-environment file, and `APP__`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    pub database_url: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Structured JSON log output.
    #[serde(default)]
    pub log_json: bool,

    /// Run database migrations on startup.
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated list of allowed CORS origins; permissive when unset
    /// in development.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Platform fee retained from each completed sale, in percent.
    #[serde(default = "default_platform_fee_percent")]
    pub platform_fee_percent: Decimal,

    /// Status-poll budget before a pending payment is marked failed.
    #[serde(default = "default_payment_max_retries")]
    pub payment_max_retries: i32,

    /// Age after which a non-terminal payment is re-polled (and, at twice
    /// this age, abandoned) by the reconciliation sweep.
    #[serde(default = "default_stale_payment_age_secs")]
    pub stale_payment_age_secs: i64,

    /// Idle window before a non-empty cart gets a reminder.
    #[serde(default = "default_cart_reminder_secs")]
    pub cart_reminder_secs: i64,

    /// Idle window before a cart is expired and cleaned up.
    #[serde(default = "default_cart_expiry_secs")]
    pub cart_expiry_secs: i64,

    /// Poll interval for the background workers.
    #[serde(default = "default_worker_poll_secs")]
    pub worker_poll_secs: u64,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    30
}
fn default_network() -> String {
    "base".to_string()
}
fn default_crypto_currency() -> String {
    "USDC".to_string()
}
fn default_platform_fee_percent() -> Decimal {
    dec!(2.5)
}
fn default_payment_max_retries() -> i32 {
    60
}
fn default_stale_payment_age_secs() -> i64 {
    600
}
fn default_cart_reminder_secs() -> i64 {
    30 * 60
}
fn default_cart_expiry_secs() -> i64 {
    7 * 24 * 60 * 60
}
fn default_worker_poll_secs() -> u64 {
    5
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}

impl AppConfig {
    /// Minimal programmatic constructor, used by tests and tooling.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            gateway: GatewayConfig::default(),
            messaging: MessagingConfig::default(),
            platform_fee_percent: default_platform_fee_percent(),
            payment_max_retries: default_payment_max_retries(),
            stale_payment_age_secs: default_stale_payment_age_secs(),
            cart_reminder_secs: default_cart_reminder_secs(),
            cart_expiry_secs: default_cart_expiry_secs(),
            worker_poll_secs: default_worker_poll_secs(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    /// Platform fee as a fraction (2.5% -> 0.025).
    pub fn platform_fee_rate(&self) -> Decimal {
        self.platform_fee_percent / dec!(100)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load configuration from files and environment.
///
/// Precedence (lowest to highest): `config/default.toml`, then
/// `config/{environment}.toml`, then `APP__`-prefixed environment variables
/// (`APP__GATEWAY__API_KEY=...` maps to `gateway.api_key`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment =
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config: AppConfig = builder.build()?.try_deserialize()?;
    info!(environment = %config.environment, "configuration loaded");
    Ok(config)
}

/// Initialize the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_percent_converts_to_rate() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            0,
            "test".into(),
        );
        assert_eq!(cfg.platform_fee_rate(), dec!(0.025));
    }
}
