//! Application layer - connection, dispatch, reconciliation and writes.
//!
//! This layer wires domain projections to the ports:
//!
//! - `ConnectionManager` - event channel lifecycle and scope membership
//! - `EventDispatcher` - name-based fan-out of decoded events
//! - `OutboundPipeline` - guarded writes reconciled into the views
//! - `views` - live read models for the UI layer

pub mod connection_manager;
pub mod dispatcher;
pub mod error;
pub mod outbound;
pub mod subscription_registry;
pub mod views;

pub use connection_manager::{ConnectionManager, ConnectionSnapshot, SendOutcome};
pub use dispatcher::{DispatchOutcome, EventDispatcher, FnHandler, HandlerId, SubscriptionHandle};
pub use error::{ErrorCategory, SyncError};
pub use outbound::{
    InFlightGuard, InFlightPermit, OutboundPipeline, SubmitOutcome, DEFAULT_WRITE_TIMEOUT,
};
pub use subscription_registry::{JoinOutcome, LeaveOutcome, SubscriptionRegistry};
pub use views::{ConversationView, MessageDelivery, PatientView};
