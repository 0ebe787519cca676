//! Credential source adapters.
//!
//! - `EnvCredentialSource` - reads the bearer credential from an environment
//!   variable on every call, so a refreshed session is picked up on reconnect
//! - `StaticCredentialSource` - fixed value, for tests and the watch binary

use secrecy::SecretString;

use crate::ports::{is_blank, CredentialSource};

/// Default variable the credential is read from.
pub const DEFAULT_CREDENTIAL_VAR: &str = "CARELINK_SYNC_TOKEN";

/// Reads the credential from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvCredentialSource {
    var: String,
}

impl EnvCredentialSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvCredentialSource {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_VAR)
    }
}

impl CredentialSource for EnvCredentialSource {
    fn credential(&self) -> Option<SecretString> {
        let value = std::env::var(&self.var).ok()?;
        let secret = SecretString::new(value);
        if is_blank(&secret) {
            tracing::debug!(var = %self.var, "Credential variable is blank");
            return None;
        }
        Some(secret)
    }
}

/// A fixed credential.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialSource {
    credential: Option<SecretString>,
}

impl StaticCredentialSource {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: Some(SecretString::new(credential.into())),
        }
    }

    /// A source with no credential.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl CredentialSource for StaticCredentialSource {
    fn credential(&self) -> Option<SecretString> {
        self.credential.clone().filter(|c| !is_blank(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn static_source_hides_blank_values() {
        assert!(StaticCredentialSource::new("  ").credential().is_none());
        assert!(StaticCredentialSource::empty().credential().is_none());
        assert_eq!(
            StaticCredentialSource::new("abc")
                .credential()
                .unwrap()
                .expose_secret(),
            "abc"
        );
    }

    #[test]
    fn env_source_reads_variable() {
        let source = EnvCredentialSource::new("CARELINK_SYNC_TEST_CREDENTIAL_ENV_SOURCE");
        std::env::remove_var(source.var());
        assert!(source.credential().is_none());

        std::env::set_var(source.var(), "token-1");
        assert_eq!(source.credential().unwrap().expose_secret(), "token-1");
        std::env::remove_var(source.var());
    }
}
