//! Transport port - the persistent bidirectional event channel.
//!
//! An adapter opens one authenticated connection per call to `open` and
//! hands back a channel pair. The connection manager owns the pair:
//!
//! - writes go through `TransportLink::outbound`, one sender, so writes are
//!   serialized without a lock
//! - frames and the final close arrive on `TransportLink::inbound`
//! - dropping the outbound sender closes the connection
//!
//! ## Wire frames
//!
//! ```text
//! server -> client   {"event": "message:new", "data": {...}}
//! client -> server   {"type": "join",  "scope": "patient:42"}
//!                    {"type": "leave", "scope": "patient:42"}
//!                    {"type": "emit",  "event": "...", "data": {...}}
//! ```

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::domain::foundation::ScopeId;

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Full `ws://` or `wss://` URL.
    pub url: String,

    /// Bearer credential presented during the upgrade.
    pub credential: SecretString,
}

/// Frame written by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving broadcasts for a scope.
    Join { scope: ScopeId },

    /// Stop receiving broadcasts for a scope.
    Leave { scope: ScopeId },

    /// Application-level event.
    Emit { event: String, data: JsonValue },
}

/// Frame pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(default)]
    pub data: JsonValue,
}

/// Why a live connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed the connection deliberately.
    ServerInitiated,

    /// The network failed underneath the connection.
    NetworkLost(String),
}

/// Something arriving from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    Frame(ServerFrame),

    /// Always the last signal of a link.
    Closed(CloseReason),
}

/// Channel pair for one open connection.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<ClientFrame>,
    pub inbound: mpsc::UnboundedReceiver<TransportSignal>,
}

/// Errors opening a connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The URL could not be turned into a request.
    #[error("Invalid transport URL: {0}")]
    InvalidUrl(String),

    /// The server rejected the credential.
    #[error("Handshake rejected: {0}")]
    Unauthorized(String),

    /// Network-level failure (refused, DNS, TLS, reset).
    #[error("Connection failed: {0}")]
    Connect(String),
}

/// Port for opening event channels to the server.
///
/// # Example
///
/// ```ignore
/// let link = transport.open(&handshake).await?;
/// link.outbound.send(ClientFrame::Join { scope })?;
/// while let Some(signal) = link.inbound.recv().await { /* ... */ }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens one authenticated connection.
    async fn open(&self, handshake: &Handshake) -> Result<TransportLink, TransportError>;
}
