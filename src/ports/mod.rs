//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the synchronization core and the outside world. Adapters implement them.
//!
//! - `Transport` - persistent bidirectional event channel
//! - `EntityApi` - collaborator REST API (snapshots and authoritative writes)
//! - `CredentialSource` - session-scoped bearer credential
//! - `SyncEventHandler` - consumer of decoded inbound events

mod credential_source;
mod entity_api;
mod event_handler;
mod transport;

pub use credential_source::{is_blank, CredentialSource};
pub use entity_api::{ApiError, EntityApi, MessageDraft, UserSummary};
pub use event_handler::SyncEventHandler;
pub use transport::{
    ClientFrame, CloseReason, Handshake, ServerFrame, Transport, TransportError, TransportLink,
    TransportSignal,
};
