//! In-memory adapters for testing.
//!
//! - `InMemoryTransport` - scripted event channel
//! - `InMemoryEntityApi` - seeded REST collaborator

mod entity_api;
mod transport;

pub use entity_api::{ApiCalls, InMemoryEntityApi};
pub use transport::{InMemoryTransport, OpenScript};
