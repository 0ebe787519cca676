//! WebSocket transport adapter.
//!
//! - `codec` - JSON text frames to and from `ClientFrame`/`ServerFrame`
//! - `transport` - `WsTransport`, one tokio-tungstenite connection per link

mod codec;
mod transport;

pub use codec::{decode_server_frame, encode_client_frame, CodecError};
pub use transport::WsTransport;
