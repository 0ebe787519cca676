//! Text-frame codec for the event channel.

use crate::ports::{ClientFrame, ServerFrame};

/// A text frame that is not a valid envelope.
#[derive(Debug, thiserror::Error)]
#[error("Malformed frame: {0}")]
pub struct CodecError(#[from] serde_json::Error);

pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Parses a server envelope. The payload is left undecoded.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, CodecError> {
    Ok(serde_json::from_str(text)?)
}
