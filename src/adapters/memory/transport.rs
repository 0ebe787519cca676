//! In-memory transport for testing.
//!
//! Each `open` accepts, refuses or hangs according to a script, and
//! every accepted link is kept so tests can push frames into it, close it
//! from the "server" side and inspect what the client wrote.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Instant;

use crate::ports::{
    ClientFrame, CloseReason, Handshake, ServerFrame, Transport, TransportError, TransportLink,
    TransportSignal,
};

/// How the next `open` behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenScript {
    Accept,
    /// Accepts, then closes from the server side before any frame.
    AcceptThenClose,
    Refuse(String),
    /// Never completes; only the caller's timeout ends it.
    Hang,
}

struct LinkRecord {
    frames_rx: mpsc::UnboundedReceiver<ClientFrame>,
    signals: mpsc::UnboundedSender<TransportSignal>,
    frames: Vec<ClientFrame>,
    closed: bool,
}

impl LinkRecord {
    fn drain(&mut self) {
        loop {
            match self.frames_rx.try_recv() {
                Ok(frame) => self.frames.push(frame),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return;
                }
            }
        }
    }
}

#[derive(Default)]
struct State {
    script: VecDeque<OpenScript>,
    fallback: Option<OpenScript>,
    opens: Vec<Instant>,
    urls: Vec<String>,
    links: Vec<LinkRecord>,
}

/// Scripted transport for tests.
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned. This is acceptable
/// for test code but this adapter should NOT be used in production.
#[derive(Default)]
pub struct InMemoryTransport {
    state: Mutex<State>,
}

impl InMemoryTransport {
    /// Transport that accepts every open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose every link is closed by the server as soon as it opens.
    pub fn closing_on_accept() -> Self {
        let transport = Self::new();
        transport.state().fallback = Some(OpenScript::AcceptThenClose);
        transport
    }

    /// Transport that refuses every open.
    pub fn refusing(reason: impl Into<String>) -> Self {
        let transport = Self::new();
        transport.state().fallback = Some(OpenScript::Refuse(reason.into()));
        transport
    }

    /// Queues behaviors for the next opens; once used up, the fallback applies.
    pub fn script(&self, steps: impl IntoIterator<Item = OpenScript>) {
        self.state().script.extend(steps);
    }

    // === Server Side ===

    /// Pushes a frame on the newest link.
    pub fn push(&self, event: &str, data: JsonValue) -> bool {
        self.signal(TransportSignal::Frame(ServerFrame {
            event: event.to_string(),
            data,
        }))
    }

    /// Closes the newest link as the server would.
    pub fn server_close(&self) -> bool {
        self.signal(TransportSignal::Closed(CloseReason::ServerInitiated))
    }

    /// Fails the newest link as a network error would.
    pub fn drop_network(&self, reason: &str) -> bool {
        self.signal(TransportSignal::Closed(CloseReason::NetworkLost(
            reason.to_string(),
        )))
    }

    // === Test Helpers ===

    pub fn open_count(&self) -> usize {
        self.state().opens.len()
    }

    /// When each open was called, on the tokio clock.
    pub fn open_instants(&self) -> Vec<Instant> {
        self.state().opens.clone()
    }

    /// URLs passed to each open.
    pub fn urls(&self) -> Vec<String> {
        self.state().urls.clone()
    }

    /// Every frame the client wrote, across all links, in order.
    pub fn frames(&self) -> Vec<ClientFrame> {
        let mut state = self.state();
        state
            .links
            .iter_mut()
            .flat_map(|link| {
                link.drain();
                link.frames.clone()
            })
            .collect()
    }

    /// Frames written on the newest link only.
    pub fn frames_on_latest_link(&self) -> Vec<ClientFrame> {
        let mut state = self.state();
        state
            .links
            .last_mut()
            .map(|link| {
                link.drain();
                link.frames.clone()
            })
            .unwrap_or_default()
    }

    /// Links the client has closed by dropping its sender.
    pub fn closed_links(&self) -> usize {
        let mut state = self.state();
        state
            .links
            .iter_mut()
            .map(|link| {
                link.drain();
                link.closed
            })
            .filter(|closed| *closed)
            .count()
    }

    fn signal(&self, signal: TransportSignal) -> bool {
        self.state()
            .links
            .last()
            .map(|link| link.signals.send(signal).is_ok())
            .unwrap_or(false)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("InMemoryTransport: state lock poisoned")
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&self, handshake: &Handshake) -> Result<TransportLink, TransportError> {
        let step = {
            let mut state = self.state();
            state.opens.push(Instant::now());
            state.urls.push(handshake.url.clone());
            state
                .script
                .pop_front()
                .or_else(|| state.fallback.clone())
                .unwrap_or(OpenScript::Accept)
        };

        let close_at_once = step == OpenScript::AcceptThenClose;
        match step {
            OpenScript::Accept | OpenScript::AcceptThenClose => {
                let (outbound, frames_rx) = mpsc::unbounded_channel();
                let (signals, inbound) = mpsc::unbounded_channel();
                if close_at_once {
                    let _ = signals.send(TransportSignal::Closed(CloseReason::ServerInitiated));
                }
                self.state().links.push(LinkRecord {
                    frames_rx,
                    signals,
                    frames: Vec::new(),
                    closed: false,
                });
                Ok(TransportLink { outbound, inbound })
            }
            OpenScript::Refuse(reason) => Err(TransportError::Connect(reason)),
            OpenScript::Hang => std::future::pending().await,
        }
    }
}
