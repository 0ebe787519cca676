//! Strongly-typed identifier value objects.
//!
//! Server-assigned ids arrive as opaque strings (numeric database keys,
//! UUIDs or Mongo object ids depending on the resource), so every id here
//! wraps a `String` rather than a parsed representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the id from an existing string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the server sent an empty id.
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Stable identity of one real-world change (a message, a medication
    /// event, an alert). The seen-id set keys on this.
    EventId
);

string_id!(
    /// A dashboard user (staff member, doctor, patient account).
    UserId
);

string_id!(
    /// A patient record.
    PatientId
);

string_id!(
    /// A medication record belonging to a patient.
    MedicationId
);

/// Broadcast partition ("room") on the server, formatted `kind:id`.
///
/// Examples: `patient:42`, `user:7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeId {
    kind: String,
    id: String,
}

impl ScopeId {
    /// Creates a scope from its kind and id.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Scope carrying every event relevant to one patient.
    pub fn patient(patient_id: &PatientId) -> Self {
        Self::new("patient", patient_id.as_str())
    }

    /// Personal scope of a user; direct messages are delivered here.
    pub fn user(user_id: &UserId) -> Self {
        Self::new("user", user_id.as_str())
    }

    /// The scope kind (`patient`, `user`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The id within the kind.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for ScopeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| ValidationError::invalid_format("scope", "missing ':' separator"))?;
        if kind.trim().is_empty() {
            return Err(ValidationError::empty_field("scope kind"));
        }
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("scope id"));
        }
        Ok(Self::new(kind.trim(), id.trim()))
    }
}

impl TryFrom<String> for ScopeId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScopeId> for String {
    fn from(scope: ScopeId) -> Self {
        scope.to_string()
    }
}
