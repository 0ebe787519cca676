//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CARELINK_SYNC` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use carelink_sync::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Event channel at {}", config.transport.ws_url().unwrap());
//! ```

mod api;
mod error;
mod reconnect;
mod transport;
mod views;

pub use api::ApiConfig;
pub use error::{ConfigError, ValidationError};
pub use reconnect::ReconnectConfig;
pub use transport::TransportConfig;
pub use views::ViewsConfig;

use serde::Deserialize;

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info,carelink_sync=debug".to_string()
}

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Event channel location
    pub transport: TransportConfig,

    /// Backoff and attempt limits
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// REST collaborator
    #[serde(default)]
    pub api: ApiConfig,

    /// View context tuning
    #[serde(default)]
    pub views: ViewsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CARELINK_SYNC` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CARELINK_SYNC__TRANSPORT__ORIGIN=https://...` -> `transport.origin`
    /// - `CARELINK_SYNC__RECONNECT__MAX_ATTEMPTS=5` -> `reconnect.max_attempts`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CARELINK_SYNC")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.transport.validate()?;
        self.reconnect.validate()?;
        self.api.validate()?;
        self.views.validate()?;
        Ok(())
    }

    /// REST base URL, falling back to the dashboard origin.
    pub fn api_base_url(&self) -> String {
        self.api
            .base_url
            .clone()
            .unwrap_or_else(|| self.transport.origin.trim_end_matches('/').to_string())
    }
}
