//! Connection manager - one persistent, authenticated event channel.
//!
//! # Lifecycle
//!
//! ```text
//! connect(credential)
//!   └─ supervisor task
//!        ├─ open (bounded by connect_timeout)
//!        │    ok  -> Connected, replay held scopes, pump inbound frames
//!        │    err -> attempt_failed -> sleep(delay) | give up
//!        │    first frame (or connect_timeout of uptime) -> link healthy
//!        └─ link closed
//!             server closed -> reconnect now, or back off if the link
//!                              never became healthy
//!             network lost  -> reconnect after backoff delay
//!             attempts used up -> Errored
//! disconnect()
//!   └─ drop outbound sender (closes transport), stop supervisor,
//!      release handlers and scopes
//! ```
//!
//! The retry bookkeeping lives in [`ConnectionState`]; this module only
//! performs the I/O and timing it decides on.
//!
//! Every state change is published on a `watch` channel so the UI layer
//! can observe terminal errors reached in the background.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secrecy::SecretString;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot, watch};

use super::dispatcher::{EventDispatcher, SubscriptionHandle};
use super::error::SyncError;
use super::subscription_registry::{JoinOutcome, LeaveOutcome, SubscriptionRegistry};
use crate::domain::connection::{ConnectionState, ConnectionStatus, ReconnectPolicy, RetryDecision};
use crate::domain::events::EventName;
use crate::domain::foundation::ScopeId;
use crate::ports::{
    is_blank, ClientFrame, CloseReason, Handshake, SyncEventHandler, Transport, TransportLink,
    TransportSignal,
};

/// Connection state as published to observers.
pub type ConnectionSnapshot = ConnectionState;

/// Result of [`ConnectionManager::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Dropped; frames are never queued while disconnected.
    NotConnected,
}

struct Shared {
    state: ConnectionState,
    registry: SubscriptionRegistry,
    outbound: Option<mpsc::UnboundedSender<ClientFrame>>,
    shutdown: Option<watch::Sender<bool>>,
    generation: u64,
}

struct Inner {
    transport: Arc<dyn Transport>,
    url: String,
    policy: ReconnectPolicy,
    dispatcher: EventDispatcher,
    shared: Mutex<Shared>,
    status: watch::Sender<ConnectionSnapshot>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a state change made by the supervisor of `generation`.
    ///
    /// Returns `None` when that supervisor has been superseded by a
    /// teardown or a newer connect.
    fn advance<T>(&self, generation: u64, f: impl FnOnce(&mut Shared) -> T) -> Option<T> {
        let mut shared = self.lock();
        if shared.generation != generation {
            return None;
        }
        let result = f(&mut shared);
        self.status.send_replace(shared.state.clone());
        Some(result)
    }
}

/// Owns the event channel, its reconnect loop and its scope memberships.
///
/// Cheap to clone; clones share one connection. Pass it to the view
/// contexts that need it rather than reaching for a global.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (status, _) = watch::channel(ConnectionState::new());
        Self {
            inner: Arc::new(Inner {
                transport,
                url: url.into(),
                policy,
                dispatcher: EventDispatcher::new(),
                shared: Mutex::new(Shared {
                    state: ConnectionState::new(),
                    registry: SubscriptionRegistry::new(),
                    outbound: None,
                    shutdown: None,
                    generation: 0,
                }),
                status,
            }),
        }
    }

    /// Connects and keeps the connection alive until [`disconnect`](Self::disconnect).
    ///
    /// Resolves once the first connection is up, or with
    /// [`SyncError::ConnectionExhausted`] when every attempt failed. Later
    /// reconnects happen in the background and are reported through
    /// [`status_updates`](Self::status_updates).
    ///
    /// Calling this while already connected does nothing. Calling it while
    /// a connection is still being established waits for that attempt and
    /// returns its outcome.
    pub async fn connect(&self, credential: Option<SecretString>) -> Result<(), SyncError> {
        let credential = match credential {
            Some(c) if !is_blank(&c) => c,
            _ => {
                tracing::error!("Refusing to connect without a credential");
                return Err(SyncError::MissingCredential);
            }
        };

        let (first_tx, first_rx) = oneshot::channel();
        let in_progress = {
            let mut shared = self.inner.lock();
            if shared.shutdown.is_some() {
                if shared.state.status.is_connected() {
                    tracing::debug!("Connect ignored; already connected");
                    return Ok(());
                }
                tracing::debug!(status = %shared.state.status, "Connect waiting on attempt in progress");
                Some(self.inner.status.subscribe())
            } else {
                start(&self.inner, &mut shared, credential, first_tx);
                None
            }
        };

        if let Some(updates) = in_progress {
            return await_outcome(updates).await;
        }

        // A dropped sender means disconnect() won the race.
        first_rx.await.unwrap_or(Ok(()))
    }

    /// Tears the connection down. Safe to call repeatedly.
    ///
    /// Closes the transport once, stops reconnecting, and releases every
    /// handler registration and scope membership.
    pub fn disconnect(&self) {
        let (outbound, shutdown) = {
            let mut shared = self.inner.lock();
            if shared.shutdown.is_none()
                && shared.outbound.is_none()
                && shared.state.status == ConnectionStatus::Disconnected
            {
                tracing::debug!("Disconnect ignored; not active");
                return;
            }
            shared.generation += 1;
            shared.state = shared.state.torn_down();
            shared.registry.clear();
            self.inner.status.send_replace(shared.state.clone());
            (shared.outbound.take(), shared.shutdown.take())
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        drop(outbound);
        self.inner.dispatcher.clear();
        tracing::info!(url = %self.inner.url, "Disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().state.status.is_connected()
    }

    pub fn status(&self) -> ConnectionSnapshot {
        self.inner.lock().state.clone()
    }

    /// Receiver that sees every state change.
    pub fn status_updates(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.inner.status.subscribe()
    }

    /// The dispatcher inbound frames are delivered through.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    /// Registers a handler for an inbound event.
    #[must_use = "dropping the handle unregisters the handler"]
    pub fn on(&self, event: EventName, handler: Arc<dyn SyncEventHandler>) -> SubscriptionHandle {
        self.inner.dispatcher.on(event, handler)
    }

    /// Writes a frame if connected; otherwise drops it with a warning.
    pub fn send(&self, frame: ClientFrame) -> SendOutcome {
        let shared = self.inner.lock();
        send_locked(&shared, frame)
    }

    /// Emits an application event.
    pub fn emit(&self, event: impl Into<String>, data: JsonValue) -> SendOutcome {
        self.send(ClientFrame::Emit {
            event: event.into(),
            data,
        })
    }

    /// Adds a consumer for `scope`; only the first one is sent.
    ///
    /// Held scopes are replayed after every (re)connection, so joining
    /// while disconnected is fine.
    pub fn join(&self, scope: ScopeId) {
        let mut shared = self.inner.lock();
        match shared.registry.join(scope.clone()) {
            JoinOutcome::First => {
                tracing::debug!(scope = %scope, "Joining scope");
                if shared.state.status.is_connected() {
                    send_locked(&shared, ClientFrame::Join { scope });
                }
            }
            JoinOutcome::Shared(consumers) => {
                tracing::trace!(scope = %scope, consumers, "Scope already joined");
            }
        }
    }

    /// Removes a consumer for `scope`; only the last one is sent.
    pub fn leave(&self, scope: &ScopeId) {
        let mut shared = self.inner.lock();
        match shared.registry.leave(scope) {
            LeaveOutcome::Released => {
                tracing::debug!(scope = %scope, "Leaving scope");
                if shared.state.status.is_connected() {
                    send_locked(
                        &shared,
                        ClientFrame::Leave {
                            scope: scope.clone(),
                        },
                    );
                }
            }
            LeaveOutcome::StillHeld(consumers) => {
                tracing::trace!(scope = %scope, consumers, "Scope still held");
            }
            LeaveOutcome::NotHeld => {
                tracing::debug!(scope = %scope, "Leave for scope not held");
            }
        }
    }

    pub fn held_scopes(&self) -> Vec<ScopeId> {
        self.inner.lock().registry.held_scopes()
    }

    pub fn consumers(&self, scope: &ScopeId) -> usize {
        self.inner.lock().registry.consumers(scope)
    }
}

/// Claims the supervisor slot and spawns the supervisor. Caller holds the lock.
fn start(
    inner: &Arc<Inner>,
    shared: &mut Shared,
    credential: SecretString,
    first: oneshot::Sender<Result<(), SyncError>>,
) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shared.shutdown = Some(shutdown_tx);
    shared.generation += 1;
    shared.state = shared.state.begin_attempt();
    inner.status.send_replace(shared.state.clone());

    let handshake = Handshake {
        url: inner.url.clone(),
        credential,
    };
    tokio::spawn(supervise(
        Arc::clone(inner),
        shared.generation,
        handshake,
        shutdown_rx,
        first,
    ));
}

fn send_locked(shared: &Shared, frame: ClientFrame) -> SendOutcome {
    let Some(outbound) = shared.outbound.as_ref().filter(|_| shared.state.status.is_connected()) else {
        tracing::warn!(frame = ?frame, "Not connected; frame dropped");
        return SendOutcome::NotConnected;
    };
    match outbound.send(frame) {
        Ok(()) => SendOutcome::Sent,
        Err(mpsc::error::SendError(frame)) => {
            tracing::warn!(frame = ?frame, "Transport closed; frame dropped");
            SendOutcome::NotConnected
        }
    }
}

/// Runs connect attempts and live sessions for one `connect` call.
async fn supervise(
    inner: Arc<Inner>,
    generation: u64,
    handshake: Handshake,
    mut shutdown: watch::Receiver<bool>,
    first: oneshot::Sender<Result<(), SyncError>>,
) {
    let mut first = Some(first);
    let policy = inner.policy.clone();

    loop {
        let opened = tokio::select! {
            result = tokio::time::timeout(policy.connect_timeout, inner.transport.open(&handshake)) => result,
            _ = shutdown.changed() => return,
        };

        let decision = match opened {
            Ok(Ok(link)) => {
                let Some(inbound) = install(&inner, generation, link) else {
                    return;
                };
                if let Some(first) = first.take() {
                    let _ = first.send(Ok(()));
                }

                let reason = tokio::select! {
                    reason = pump(&inner, generation, inbound) => reason,
                    _ = shutdown.changed() => return,
                };

                let decided = inner.advance(generation, |shared| {
                    shared.outbound = None;
                    let (state, decision) = match &reason {
                        CloseReason::ServerInitiated => shared.state.server_disconnected(&policy),
                        CloseReason::NetworkLost(why) => {
                            shared.state.transport_lost(why.clone(), &policy)
                        }
                    };
                    shared.state = state;
                    settle_decision(shared, decision)
                });
                let Some((decision, attempt, error)) = decided else { return };

                if decision == RetryDecision::GiveUp {
                    give_up(&inner, attempt, error, first.take());
                    return;
                }
                tracing::warn!(url = %handshake.url, reason = ?reason, attempt, "Connection lost; reconnecting");
                decision
            }
            failed => {
                let error = match failed {
                    Ok(Err(e)) => e.to_string(),
                    _ => format!("Timed out after {:?}", policy.connect_timeout),
                };
                let decided = inner.advance(generation, |shared| {
                    let (state, decision) = shared.state.attempt_failed(error.clone(), &policy);
                    shared.state = state;
                    settle_decision(shared, decision)
                });
                let Some((decision, attempt, _)) = decided else { return };
                tracing::warn!(url = %handshake.url, attempt, error = %error, "Connect attempt failed");

                if decision == RetryDecision::GiveUp {
                    give_up(&inner, attempt, error, first.take());
                    return;
                }
                decision
            }
        };

        if let RetryDecision::RetryAfter(delay) = decision {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }
        }

        if inner
            .advance(generation, |shared| shared.state = shared.state.begin_attempt())
            .is_none()
        {
            return;
        }
    }
}

/// Marks the link live and replays held scopes on it.
fn install(
    inner: &Inner,
    generation: u64,
    link: TransportLink,
) -> Option<mpsc::UnboundedReceiver<TransportSignal>> {
    let TransportLink { outbound, inbound } = link;
    inner.advance(generation, |shared| {
        shared.state = shared.state.connected();
        let scopes = shared.registry.held_scopes();
        for scope in &scopes {
            let _ = outbound.send(ClientFrame::Join {
                scope: scope.clone(),
            });
        }
        shared.outbound = Some(outbound);
        tracing::info!(url = %inner.url, replayed_scopes = scopes.len(), "Connected");
    })?;
    Some(inbound)
}

/// Releases the supervisor slot when `decision` ends the connection.
///
/// Done in the same critical section as the `Errored` transition so a
/// concurrent `connect` either waits on this supervisor or starts afresh.
fn settle_decision(shared: &mut Shared, decision: RetryDecision) -> (RetryDecision, u32, String) {
    if decision == RetryDecision::GiveUp {
        shared.shutdown = None;
        shared.outbound = None;
    }
    (
        decision,
        shared.state.attempt,
        shared.state.last_error.clone().unwrap_or_default(),
    )
}

/// Delivers inbound frames until the link closes.
///
/// The link is marked healthy on its first frame, or once it has stayed
/// open for `connect_timeout`.
async fn pump(
    inner: &Inner,
    generation: u64,
    mut inbound: mpsc::UnboundedReceiver<TransportSignal>,
) -> CloseReason {
    let stable = tokio::time::sleep(inner.policy.connect_timeout);
    tokio::pin!(stable);
    let mut healthy = false;

    loop {
        let signal = tokio::select! {
            signal = inbound.recv() => signal,
            _ = &mut stable, if !healthy => {
                healthy = mark_healthy(inner, generation);
                continue;
            }
        };

        match signal {
            Some(TransportSignal::Frame(frame)) => {
                if !healthy {
                    healthy = mark_healthy(inner, generation);
                }
                tracing::trace!(event = %frame.event, "Frame received");
                inner.dispatcher.dispatch_frame(&frame.event, frame.data);
            }
            Some(TransportSignal::Closed(reason)) => return reason,
            None => {
                return CloseReason::NetworkLost("transport dropped without closing".to_string())
            }
        }
    }
}

fn mark_healthy(inner: &Inner, generation: u64) -> bool {
    let _ = inner.advance(generation, |shared| shared.state = shared.state.link_healthy());
    true
}

fn give_up(
    inner: &Inner,
    attempts: u32,
    last_error: String,
    first: Option<oneshot::Sender<Result<(), SyncError>>>,
) {
    tracing::error!(url = %inner.url, attempts, last_error = %last_error, "Giving up on connection");
    let err = SyncError::ConnectionExhausted {
        attempts,
        last_error,
    };
    if let Some(first) = first {
        let _ = first.send(Err(err));
    }
}

/// Follows the status of an attempt started by another caller.
async fn await_outcome(mut updates: watch::Receiver<ConnectionSnapshot>) -> Result<(), SyncError> {
    loop {
        {
            let snapshot = updates.borrow_and_update();
            match snapshot.status {
                ConnectionStatus::Connected | ConnectionStatus::Disconnected => return Ok(()),
                ConnectionStatus::Errored => {
                    return Err(SyncError::ConnectionExhausted {
                        attempts: snapshot.attempt,
                        last_error: snapshot.last_error.clone().unwrap_or_default(),
                    })
                }
                ConnectionStatus::Connecting => {}
            }
        }
        if updates.changed().await.is_err() {
            return Ok(());
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.url)
            .field("status", &self.status().status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryTransport, OpenScript};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn manager(transport: &Arc<InMemoryTransport>) -> ConnectionManager {
        ConnectionManager::new(
            Arc::clone(transport) as Arc<dyn Transport>,
            "ws://localhost:5000/ws",
            ReconnectPolicy::default(),
        )
    }

    fn token() -> Option<SecretString> {
        Some(SecretString::new("session-token".to_string()))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn missing_credential_fails_without_opening() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);

        let err = manager.connect(None).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingCredential));

        let err = manager
            .connect(Some(SecretString::new("   ".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingCredential));

        assert_eq!(transport.open_count(), 0);
        assert_eq!(manager.status().status, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn connect_reaches_connected() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);

        manager.connect(token()).await.unwrap();

        assert!(manager.is_connected());
        assert_eq!(transport.open_count(), 1);
        assert_eq!(manager.status().attempt, 0);
    }

    #[tokio::test]
    async fn second_connect_is_a_no_op() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);

        manager.connect(token()).await.unwrap();
        manager.connect(token()).await.unwrap();

        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn send_while_disconnected_is_dropped() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);

        let outcome = manager.emit("typing", json!({}));

        assert_eq!(outcome, SendOutcome::NotConnected);
        assert!(transport.frames().is_empty());
    }

    #[tokio::test]
    async fn join_is_sent_once_per_scope() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);
        manager.connect(token()).await.unwrap();
        let scope = ScopeId::new("patient", "42");

        manager.join(scope.clone());
        manager.join(scope.clone());
        manager.leave(&scope);

        assert_eq!(
            transport.frames(),
            vec![ClientFrame::Join {
                scope: scope.clone()
            }]
        );

        manager.leave(&scope);
        assert_eq!(transport.frames().len(), 2);
        assert_eq!(transport.frames()[1], ClientFrame::Leave { scope });
    }

    #[tokio::test]
    async fn inbound_frames_reach_handlers() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _handle = manager.dispatcher().on_fn(EventName::RecordChanged, "counter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        manager.connect(token()).await.unwrap();

        transport.push("record:changed", json!({"entity": "patient", "patientId": "42"}));
        settle().await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_closes_transport_once_and_releases_handlers() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);
        let _handle = manager
            .dispatcher()
            .on_fn(EventName::AlertCreated, "noop", |_| Ok(()));
        manager.connect(token()).await.unwrap();

        manager.disconnect();
        manager.disconnect();
        settle().await;

        assert_eq!(transport.closed_links(), 1);
        assert_eq!(manager.status().status, ConnectionStatus::Disconnected);
        assert_eq!(manager.dispatcher().handler_count(EventName::AlertCreated), 0);
        assert_eq!(manager.emit("x", json!({})), SendOutcome::NotConnected);
    }

    #[tokio::test(start_paused = true)]
    async fn server_close_reconnects_immediately() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);
        manager.connect(token()).await.unwrap();

        transport.server_close();
        settle().await;

        assert_eq!(transport.open_count(), 2);
        let opens = transport.open_instants();
        assert_eq!(opens[1] - opens[0], Duration::ZERO);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn server_closing_every_link_exhausts_attempts() {
        let transport = Arc::new(InMemoryTransport::closing_on_accept());
        let manager = manager(&transport);
        let mut updates = manager.status_updates();

        manager.connect(token()).await.unwrap();
        while updates.borrow_and_update().status != ConnectionStatus::Errored {
            updates.changed().await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.open_count(), 5);
        let opens = transport.open_instants();
        let delays: Vec<Duration> = opens.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(4),
            ]
        );
        let status = manager.status();
        assert_eq!(status.status, ConnectionStatus::Errored);
        assert_eq!(status.attempt, 5);
        assert_eq!(status.last_error.as_deref(), Some("Closed by server"));
    }

    #[tokio::test(start_paused = true)]
    async fn first_frame_marks_link_healthy() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);
        manager.connect(token()).await.unwrap();

        transport.server_close();
        settle().await;
        assert!(manager.is_connected());
        assert_eq!(manager.status().attempt, 1);

        transport.push("record:changed", json!({"entity": "patient", "patientId": "42"}));
        settle().await;
        assert_eq!(manager.status().attempt, 0);

        transport.server_close();
        settle().await;
        let opens = transport.open_instants();
        assert_eq!(opens.len(), 3);
        assert_eq!(opens[2] - opens[1], Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_link_becomes_healthy_after_connect_timeout() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.script([OpenScript::Refuse("refused".to_string())]);
        let manager = manager(&transport);

        manager.connect(token()).await.unwrap();
        assert_eq!(manager.status().attempt, 1);

        tokio::time::sleep(Duration::from_secs(21)).await;
        settle().await;

        assert_eq!(manager.status().attempt, 0);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_connect_shares_exhaustion() {
        let transport = Arc::new(InMemoryTransport::refusing("connection refused"));
        let manager = manager(&transport);

        let (first, second) = tokio::join!(manager.connect(token()), manager.connect(token()));

        for result in [first, second] {
            match result {
                Err(SyncError::ConnectionExhausted { attempts, .. }) => assert_eq!(attempts, 5),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(transport.open_count(), 5);
    }

    #[tokio::test]
    async fn concurrent_connect_shares_success() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);

        let (first, second) = tokio::join!(manager.connect(token()), manager.connect(token()));

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(manager.is_connected());
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_loss_waits_base_delay() {
        let transport = Arc::new(InMemoryTransport::new());
        let manager = manager(&transport);
        manager.connect(token()).await.unwrap();

        transport.drop_network("connection reset");
        settle().await;
        assert_eq!(transport.open_count(), 1);
        assert_eq!(manager.status().status, ConnectionStatus::Connecting);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        settle().await;

        assert_eq!(transport.open_count(), 2);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_open_counts_as_failed_attempt() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.script([OpenScript::Hang, OpenScript::Accept]);
        let manager = manager(&transport);

        manager.connect(token()).await.unwrap();

        assert_eq!(transport.open_count(), 2);
        let opens = transport.open_instants();
        // 20s timeout, then 1s backoff.
        assert_eq!(opens[1] - opens[0], Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_backoff_stops_retrying() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.script([OpenScript::Refuse("refused".to_string())]);
        let manager = manager(&transport);
        let background = manager.clone();
        let connecting = tokio::spawn(async move { background.connect(token()).await });

        settle().await;
        assert_eq!(transport.open_count(), 1);
        manager.disconnect();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(connecting.await.unwrap().is_ok());
        assert_eq!(transport.open_count(), 1);
        assert_eq!(manager.status().status, ConnectionStatus::Disconnected);
    }
}
