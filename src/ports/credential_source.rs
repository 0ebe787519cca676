//! CredentialSource port - where the session's bearer credential lives.
//!
//! The dashboard keeps the credential in session-scoped storage. This core
//! only reads it; issuing and refreshing it belong to the auth layer.

use secrecy::{ExposeSecret, SecretString};

/// Port for reading the current session credential.
pub trait CredentialSource: Send + Sync {
    /// The credential, or `None` when the session has none.
    ///
    /// Blank credentials are reported as `None`.
    fn credential(&self) -> Option<SecretString>;
}

/// True when the credential is absent or blank.
pub fn is_blank(credential: &SecretString) -> bool {
    credential.expose_secret().trim().is_empty()
}
