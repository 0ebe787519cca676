//! SyncEventHandler port - consumers of decoded inbound events.

use crate::domain::events::SyncEvent;
use crate::domain::foundation::DomainError;

/// Handler for decoded inbound events.
///
/// Implementations must be:
/// - **Quick** - handlers run to completion on the delivery path; anything
///   slow must be handed off (e.g. to a refresh task)
/// - **Isolated** - an error is logged by the dispatcher and does not
///   affect sibling handlers
///
/// # Example
///
/// ```ignore
/// struct AlertBadge { /* ... */ }
///
/// impl SyncEventHandler for AlertBadge {
///     fn handle(&self, event: &SyncEvent) -> Result<(), DomainError> {
///         if let SyncEvent::AlertCreated(alert) = event { /* bump counter */ }
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "AlertBadge"
///     }
/// }
/// ```
pub trait SyncEventHandler: Send + Sync {
    /// Process one event.
    fn handle(&self, event: &SyncEvent) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}
