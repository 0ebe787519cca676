//! Event channel configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Where the event channel lives.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Dashboard origin, e.g. `https://dashboard.example.org`
    pub origin: String,

    /// Full `ws(s)://` URL; replaces the one derived from `origin`
    pub url: Option<String>,

    /// Path appended to the derived URL
    #[serde(default = "default_path")]
    pub path: String,
}

impl TransportConfig {
    /// The WebSocket URL to connect to.
    ///
    /// `http` origins map to `ws`, `https` to `wss`.
    pub fn ws_url(&self) -> Result<String, ValidationError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let origin = self.origin.trim_end_matches('/');
        let rest = if let Some(rest) = origin.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = origin.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(ValidationError::InvalidOrigin);
        };
        Ok(format!("{}{}", rest, self.path))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.origin.trim().is_empty() {
            return Err(ValidationError::MissingRequired("transport.origin"));
        }
        if let Some(url) = &self.url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ValidationError::InvalidTransportUrl);
            }
        }
        self.ws_url().map(|_| ())
    }
}

fn default_path() -> String {
    "/ws".to_string()
}
