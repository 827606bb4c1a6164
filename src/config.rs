use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::services::gateway::RAZORPAY_API_BASE;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 10000;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_ROOM_PRICE: u32 = 2400;
const DEFAULT_TAX_RATE: f64 = 0.18;
const DEFAULT_IDEMPOTENCY_TTL_SECS: u64 = 24 * 3600;
const DEFAULT_WEBHOOK_DEDUPE_TTL_SECS: u64 = 24 * 3600;
const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Application configuration structure with validation
#[derive(Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Public gateway key id, handed to the checkout modal
    #[validate(length(min = 1))]
    pub razorpay_key_id: String,

    /// Gateway key secret; signs checkout callbacks
    #[validate(length(min = 1))]
    pub razorpay_key_secret: String,

    /// Webhook secret. Without one, webhooks are acknowledged unverified.
    #[serde(default)]
    pub razorpay_webhook_secret: Option<String>,

    /// Gateway REST base URL
    #[serde(default = "default_api_base")]
    #[validate(url)]
    pub razorpay_api_base: String,

    /// Timeout for gateway calls; unset means no timeout
    #[serde(default)]
    pub gateway_timeout_secs: Option<u64>,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    /// Nightly room rate in rupees
    #[serde(default = "default_room_price")]
    #[validate(range(min = 1))]
    pub room_price_per_night: u32,

    /// Tax rate applied to the stay subtotal (0.18 = 18%)
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: f64,

    /// Reject orders whose booking carries no stay window
    #[serde(default)]
    pub require_priced_booking: bool,

    /// Comma separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow any origin outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default)]
    pub cors_allow_credentials: bool,

    #[serde(default = "default_idempotency_ttl")]
    pub idempotency_ttl_secs: u64,

    #[serde(default = "default_webhook_dedupe_ttl")]
    pub webhook_dedupe_ttl_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    #[validate(range(min = 1024))]
    pub max_body_size: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("razorpay_key_id", &self.razorpay_key_id)
            .field("razorpay_key_secret", &"[redacted]")
            .field(
                "razorpay_webhook_secret",
                &self.razorpay_webhook_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("razorpay_api_base", &self.razorpay_api_base)
            .field("room_price_per_night", &self.room_price_per_night)
            .field("tax_rate", &self.tax_rate)
            .field("require_priced_booking", &self.require_priced_booking)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Builds a config with defaults around the given gateway credentials.
    pub fn new(key_id: String, key_secret: String, environment: String) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            environment,
            log_level: default_log_level(),
            log_json: false,
            razorpay_key_id: key_id,
            razorpay_key_secret: key_secret,
            razorpay_webhook_secret: None,
            razorpay_api_base: default_api_base(),
            gateway_timeout_secs: None,
            default_currency: default_currency(),
            room_price_per_night: DEFAULT_ROOM_PRICE,
            tax_rate: DEFAULT_TAX_RATE,
            require_priced_booking: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            idempotency_ttl_secs: DEFAULT_IDEMPOTENCY_TTL_SECS,
            webhook_dedupe_ttl_secs: DEFAULT_WEBHOOK_DEDUPE_TTL_SECS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.razorpay_webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn room_price(&self) -> Decimal {
        Decimal::from(self.room_price_per_night)
    }

    /// Tax rate as an exact decimal (`0.18` stays `0.18`).
    pub fn tax_rate(&self) -> Decimal {
        Decimal::from_str(&self.tax_rate.to_string())
            .unwrap_or(crate::services::pricing::DEFAULT_TAX_RATE)
    }

    pub fn gateway_timeout(&self) -> Option<Duration> {
        self.gateway_timeout_secs.map(Duration::from_secs)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    pub fn webhook_dedupe_ttl(&self) -> Duration {
        Duration::from_secs(self.webhook_dedupe_ttl_secs)
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.is_production() && self.razorpay_key_id.starts_with("rzp_test_") {
            warn!("production environment is using a Razorpay test key");
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing Razorpay credentials: set RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET")]
    MissingCredentials,
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_api_base() -> String {
    RAZORPAY_API_BASE.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_room_price() -> u32 {
    DEFAULT_ROOM_PRICE
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

fn default_idempotency_ttl() -> u64 {
    DEFAULT_IDEMPOTENCY_TTL_SECS
}

fn default_webhook_dedupe_ttl() -> u64 {
    DEFAULT_WEBHOOK_DEDUPE_TTL_SECS
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_tax_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate < 0.0 || rate > 1.0 {
        let mut err = ValidationError::new("tax_rate");
        err.message = Some("tax_rate must be a finite value between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("homestay_payments={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Un-prefixed variables the original deployment used. They win over
/// everything else when set.
#[derive(Debug, Clone, Default)]
pub struct LegacyEnv {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub port: Option<String>,
}

impl LegacyEnv {
    pub fn from_process_env() -> Self {
        let read = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            key_id: read("RAZORPAY_KEY_ID"),
            key_secret: read("RAZORPAY_KEY_SECRET"),
            webhook_secret: read("RAZORPAY_WEBHOOK_SECRET"),
            port: read("PORT"),
        }
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
/// 5. RAZORPAY_KEY_ID, RAZORPAY_KEY_SECRET, RAZORPAY_WEBHOOK_SECRET, PORT
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    load_config_from(Path::new(CONFIG_DIR), &run_env, &LegacyEnv::from_process_env())
}

pub fn load_config_from(
    config_dir: &Path,
    run_env: &str,
    legacy: &LegacyEnv,
) -> Result<AppConfig, AppConfigError> {
    let config = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_override_option("razorpay_key_id", legacy.key_id.clone())?
        .set_override_option("razorpay_key_secret", legacy.key_secret.clone())?
        .set_override_option("razorpay_webhook_secret", legacy.webhook_secret.clone())?
        .set_override_option("port", legacy.port.clone())?
        .build()?;

    // Check credentials before deserialization to provide a clear error message
    let has = |key: &str| {
        config
            .get_string(key)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    };
    if !has("razorpay_key_id") || !has("razorpay_key_secret") {
        error!("Missing Razorpay credentials in configuration or environment");
        return Err(AppConfigError::MissingCredentials);
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
