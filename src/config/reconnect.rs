//! Reconnect policy configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::connection::ReconnectPolicy;

/// Backoff settings, in milliseconds and seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Total attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ValidationError::InvalidBackoff);
        }
        if self.connect_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("reconnect.connect_timeout_secs"));
        }
        Ok(())
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    20
}
