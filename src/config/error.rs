//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Dashboard origin must be an http(s) URL")]
    InvalidOrigin,

    #[error("Transport URL override must be a ws(s) URL")]
    InvalidTransportUrl,

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(&'static str),

    #[error("Reconnect base delay exceeds max delay")]
    InvalidBackoff,

    #[error("Reconnect max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("Seen-id capacity must be at least 1")]
    InvalidSeenCapacity,
}
