//! REST collaborator configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API; defaults to the transport origin
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Bound on one outbound write, in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Environment variable holding the session credential
    #[serde(default = "default_credential_var")]
    pub credential_var: String,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout("api.request_timeout_secs"));
        }
        if self.write_timeout_secs == 0 || self.write_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout("api.write_timeout_secs"));
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ValidationError::InvalidOrigin);
            }
        }
        if self.credential_var.trim().is_empty() {
            return Err(ValidationError::MissingRequired("api.credential_var"));
        }
        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: default_request_timeout(),
            write_timeout_secs: default_write_timeout(),
            credential_var: default_credential_var(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_write_timeout() -> u64 {
    15
}

fn default_credential_var() -> String {
    crate::adapters::credential::DEFAULT_CREDENTIAL_VAR.to_string()
}
