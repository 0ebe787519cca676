//! Errors surfaced by the synchronization core to its callers.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::ports::ApiError;

/// Errors returned from connection, write and view operations.
///
/// Per-attempt reconnect failures never show up here; they are logged and
/// retried. Only the terminal outcome is surfaced.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("No session credential available")]
    MissingCredential,

    #[error("Nothing to send: {field} is empty")]
    EmptyPayload { field: &'static str },

    #[error("Gave up connecting after {attempts} attempts: {last_error}")]
    ConnectionExhausted { attempts: u32, last_error: String },

    #[error("Write failed: {0}")]
    WriteFailed(#[source] ApiError),

    #[error("Write timed out after {0:?}")]
    WriteTimedOut(Duration),

    #[error("Could not load {aggregate}: {source}")]
    SnapshotFailed {
        aggregate: &'static str,
        #[source]
        source: ApiError,
    },
}

/// Broad class of a [`SyncError`], for deciding how to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A local precondition failed; nothing was sent.
    Precondition,
    /// The event channel could not be (re)established.
    Connectivity,
    /// The authoritative write did not complete.
    Write,
    /// A baseline snapshot could not be loaded.
    Fetch,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::MissingCredential | SyncError::EmptyPayload { .. } => {
                ErrorCategory::Precondition
            }
            SyncError::ConnectionExhausted { .. } => ErrorCategory::Connectivity,
            SyncError::WriteFailed(_) | SyncError::WriteTimedOut(_) => ErrorCategory::Write,
            SyncError::SnapshotFailed { .. } => ErrorCategory::Fetch,
        }
    }

    pub(crate) fn snapshot(aggregate: &'static str, source: ApiError) -> Self {
        SyncError::SnapshotFailed { aggregate, source }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Precondition => "precondition",
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Write => "write",
            ErrorCategory::Fetch => "fetch",
        };
        write!(f, "{}", s)
    }
}
