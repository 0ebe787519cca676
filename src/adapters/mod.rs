//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the synchronization core to external systems:
//! - `websocket` - `Transport` over tokio-tungstenite
//! - `http` - `EntityApi` over reqwest
//! - `credential` - `CredentialSource` from the environment or a fixed value
//! - `memory` - in-process fakes of every port for tests

pub mod credential;
pub mod http;
pub mod memory;
pub mod websocket;

pub use credential::{EnvCredentialSource, StaticCredentialSource};
pub use http::{RestApiConfig, RestEntityApi};
pub use memory::{InMemoryEntityApi, InMemoryTransport};
pub use websocket::WsTransport;
