//! `WsTransport` - the event channel over tokio-tungstenite.
//!
//! Each `open` performs one upgrade with the credential in the
//! `Authorization` header, then hands the socket to a pump task. The task
//! owns both halves of the stream:
//!
//! ```text
//! outbound rx ──encode──▶ sink          (sender dropped -> Close, task ends)
//! stream ──decode──▶ inbound tx         (Close / error / EOF -> Closed(reason))
//! ```

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use http::header::{HeaderValue, AUTHORIZATION};
use http::StatusCode;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::codec::{decode_server_frame, encode_client_frame};
use crate::ports::{
    ClientFrame, CloseReason, Handshake, Transport, TransportError, TransportLink,
    TransportSignal,
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens authenticated WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, handshake: &Handshake) -> Result<TransportLink, TransportError> {
        let mut request = handshake
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", handshake.url, e)))?;

        let bearer = format!("Bearer {}", handshake.credential.expose_secret());
        let value = HeaderValue::from_str(&bearer)
            .map_err(|_| TransportError::Unauthorized("credential is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, value);

        let (stream, response) = connect_async(request).await.map_err(map_connect_error)?;
        tracing::debug!(url = %handshake.url, status = %response.status(), "WebSocket upgraded");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(stream, outbound_rx, inbound_tx));

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn map_connect_error(error: WsError) -> TransportError {
    match error {
        WsError::Http(response)
            if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) =>
        {
            TransportError::Unauthorized(format!("server answered {}", response.status()))
        }
        WsError::Url(e) => TransportError::InvalidUrl(e.to_string()),
        other => TransportError::Connect(other.to_string()),
    }
}

async fn pump(
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
    inbound: mpsc::UnboundedSender<TransportSignal>,
) {
    let (mut sink, mut source) = stream.split();

    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // Owner dropped the link; nobody is listening for the close.
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                };
                let text = match encode_client_frame(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping unencodable client frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    break CloseReason::NetworkLost(e.to_string());
                }
            }
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => match decode_server_frame(&text) {
                    Ok(frame) => {
                        if inbound.send(TransportSignal::Frame(frame)).is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Ignoring malformed server frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Server closed the connection");
                    break CloseReason::ServerInitiated;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break CloseReason::NetworkLost(e.to_string()),
                None => break CloseReason::NetworkLost("stream ended".to_string()),
            },
        }
    };

    let _ = inbound.send(TransportSignal::Closed(reason));
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[tokio::test]
    async fn malformed_url_is_rejected_before_connecting() {
        let handshake = Handshake {
            url: "not a url".to_string(),
            credential: SecretString::new("token".to_string()),
        };

        let err = WsTransport::new().open(&handshake).await.unwrap_err();

        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn credential_with_newline_is_refused() {
        let handshake = Handshake {
            url: "ws://127.0.0.1:1/ws".to_string(),
            credential: SecretString::new("bad\ntoken".to_string()),
        };

        let err = WsTransport::new().open(&handshake).await.unwrap_err();

        assert!(matches!(err, TransportError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_connect_error() {
        let handshake = Handshake {
            url: "ws://127.0.0.1:1/ws".to_string(),
            credential: SecretString::new("token".to_string()),
        };

        let err = WsTransport::new().open(&handshake).await.unwrap_err();

        assert!(matches!(err, TransportError::Connect(_)));
    }
}
