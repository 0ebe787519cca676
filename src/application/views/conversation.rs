//! Conversation view: the thread list plus at most one open conversation.
//!
//! Messages reach this view from two directions, the outbound pipeline's
//! confirmed writes and `message:new` pushes. Both go through
//! [`ConversationView::accept_message`], so the open conversation sees each
//! stable id at most once whichever arrives first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::spawn_refresh_worker;
use crate::application::connection_manager::ConnectionManager;
use crate::application::dispatcher::SubscriptionHandle;
use crate::application::error::SyncError;
use crate::domain::events::{EventName, MessagePayload, SyncEvent};
use crate::domain::foundation::{DomainError, ScopeId, UserId};
use crate::domain::projection::{
    invalidated_by, AggregateKind, ConversationProjection, RefreshSignal, ThreadListProjector,
    ThreadSummary, ThreadUpdate,
};
use crate::domain::reconciliation::{Materialization, Reconciler, SeenIdSet};
use crate::ports::{EntityApi, UserSummary};

/// What happened to a message offered to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDelivery {
    /// Added to the open conversation.
    Materialized,
    /// Already in the open conversation.
    Duplicate,
    /// Not part of the open conversation; only the thread list saw it.
    OutOfContext,
}

struct ActiveConversation {
    epoch: u64,
    reconciler: Reconciler<ConversationProjection>,
}

impl ActiveConversation {
    fn counterpart(&self) -> &UserId {
        self.reconciler.projection().counterpart()
    }
}

struct State {
    threads: ThreadListProjector,
    active: Option<ActiveConversation>,
    epoch: u64,
    handles: Vec<SubscriptionHandle>,
    closed: bool,
}

struct Inner {
    me: UserId,
    scope: ScopeId,
    api: Arc<dyn EntityApi>,
    manager: ConnectionManager,
    seen_capacity: usize,
    state: Mutex<State>,
    refresh: mpsc::UnboundedSender<RefreshSignal>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accept_message(&self, message: &MessagePayload) -> MessageDelivery {
        let mut state = self.lock();
        if state.closed {
            return MessageDelivery::OutOfContext;
        }

        if state.threads.record_message(message) == ThreadUpdate::NewCounterpart {
            self.request_refresh(AggregateKind::ThreadList, "new counterpart");
        }

        let Some(active) = state
            .active
            .as_mut()
            .filter(|a| message.is_between(&self.me, a.counterpart()))
        else {
            tracing::trace!(message_id = %message.id, "Message outside open conversation");
            return MessageDelivery::OutOfContext;
        };

        match active.reconciler.materialize(message.clone()) {
            Materialization::Applied => MessageDelivery::Materialized,
            Materialization::Duplicate => {
                tracing::debug!(message_id = %message.id, "Duplicate message discarded");
                MessageDelivery::Duplicate
            }
        }
    }

    fn on_event(&self, event: &SyncEvent) -> Result<(), DomainError> {
        match event {
            SyncEvent::MessageNew(message) => {
                self.accept_message(message);
            }
            other => {
                for aggregate in invalidated_by(other) {
                    if aggregate == AggregateKind::ThreadList {
                        self.request_refresh(aggregate, "record changed");
                    }
                }
            }
        }
        Ok(())
    }

    fn request_refresh(&self, aggregate: AggregateKind, reason: &'static str) {
        if self.refresh.send(RefreshSignal::new(aggregate, reason)).is_err() {
            tracing::trace!(reason, "Refresh worker gone");
        }
    }

    async fn refetch(self: Arc<Self>, aggregate: AggregateKind) {
        if aggregate != AggregateKind::ThreadList {
            return;
        }
        match self.api.fetch_threads().await {
            Ok(threads) => {
                let mut state = self.lock();
                if state.closed {
                    return;
                }
                state.threads.replace_all(threads);
                if let Some(counterpart) = state.active.as_ref().map(|a| a.counterpart().clone()) {
                    state.threads.pin(counterpart, None);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Thread list refresh failed; keeping current list");
            }
        }
    }

    fn close(&self) {
        let handles = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.active = None;
            std::mem::take(&mut state.handles)
        };
        drop(handles);
        self.manager.leave(&self.scope);
        tracing::debug!(user = %self.me, "Conversation view closed");
    }
}

/// Messaging sidebar and open conversation for one signed-in user.
///
/// Dropping the view unregisters its handlers and leaves the user scope.
pub struct ConversationView {
    inner: Arc<Inner>,
}

impl ConversationView {
    /// Loads the thread list and starts listening for messages.
    pub async fn load(
        me: UserId,
        api: Arc<dyn EntityApi>,
        manager: ConnectionManager,
        seen_capacity: usize,
    ) -> Result<Self, SyncError> {
        let threads = api
            .fetch_threads()
            .await
            .map_err(|e| SyncError::snapshot("thread list", e))?;

        let (refresh, signals) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            scope: ScopeId::user(&me),
            me: me.clone(),
            api,
            manager: manager.clone(),
            seen_capacity,
            state: Mutex::new(State {
                threads: ThreadListProjector::from_snapshot(me, threads),
                active: None,
                epoch: 0,
                handles: Vec::new(),
                closed: false,
            }),
            refresh,
        });

        let handles = [EventName::MessageNew, EventName::RecordChanged]
            .into_iter()
            .map(|event| {
                let view = Arc::downgrade(&inner);
                manager.dispatcher().on_fn(event, "ConversationView", move |e| {
                    match view.upgrade() {
                        Some(inner) => inner.on_event(e),
                        None => Ok(()),
                    }
                })
            })
            .collect();
        inner.lock().handles = handles;
        manager.join(inner.scope.clone());

        spawn_refresh_worker(Arc::downgrade(&inner), signals, Inner::refetch);
        tracing::info!(user = %inner.me, "Conversation view loaded");
        Ok(Self { inner })
    }

    pub fn me(&self) -> &UserId {
        &self.inner.me
    }

    /// Opens the conversation with `counterpart`, replacing any open one.
    ///
    /// Messages pushed while the history loads are kept; the history is
    /// merged through the same seen-id set.
    pub async fn open(&self, counterpart: UserId) -> Result<(), SyncError> {
        let epoch = {
            let mut state = self.inner.lock();
            state.epoch += 1;
            let epoch = state.epoch;
            state.active = Some(ActiveConversation {
                epoch,
                reconciler: Reconciler::new(
                    ConversationProjection::new(counterpart.clone()),
                    SeenIdSet::new(self.inner.seen_capacity),
                ),
            });
            state.threads.pin(counterpart.clone(), None);
            epoch
        };

        let history = self.inner.api.fetch_conversation(&counterpart).await;

        let mut state = self.inner.lock();
        let messages = match history {
            Ok(messages) => messages,
            Err(e) => {
                if state.active.as_ref().is_some_and(|a| a.epoch == epoch) {
                    state.active = None;
                }
                return Err(SyncError::snapshot("conversation", e));
            }
        };
        let Some(active) = state.active.as_mut().filter(|a| a.epoch == epoch) else {
            tracing::debug!(counterpart = %counterpart, "Conversation closed while loading; history discarded");
            return Ok(());
        };

        let loaded = messages.len();
        for message in messages {
            active.reconciler.materialize(message);
        }
        tracing::debug!(counterpart = %counterpart, loaded, "Conversation opened");
        Ok(())
    }

    /// Closes the open conversation and drops its seen-id set.
    pub fn close_conversation(&self) {
        let mut state = self.inner.lock();
        state.epoch += 1;
        state.active = None;
    }

    pub fn active_counterpart(&self) -> Option<UserId> {
        self.inner
            .lock()
            .active
            .as_ref()
            .map(|a| a.counterpart().clone())
    }

    /// Messages of the open conversation, oldest first.
    pub fn messages(&self) -> Vec<MessagePayload> {
        self.inner
            .lock()
            .active
            .as_ref()
            .map(|a| a.reconciler.projection().messages().to_vec())
            .unwrap_or_default()
    }

    /// Thread list in display order.
    pub fn threads(&self) -> Vec<ThreadSummary> {
        self.inner
            .lock()
            .threads
            .ordered()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Offers a message from any source to the view.
    pub fn accept_message(&self, message: &MessagePayload) -> MessageDelivery {
        self.inner.accept_message(message)
    }

    /// Looks up users to start a conversation with.
    pub async fn search(&self, query: &str) -> Result<Vec<UserSummary>, SyncError> {
        self.inner
            .api
            .search_users(query)
            .await
            .map_err(|e| SyncError::snapshot("user search", e))
    }

    /// Shows `user` in the thread list before any message is exchanged.
    pub fn pin(&self, user: &UserSummary) {
        self.inner
            .lock()
            .threads
            .pin(user.id.clone(), Some(user.name.clone()));
    }

    /// Re-fetches the thread list now.
    pub async fn refresh_threads(&self) {
        Arc::clone(&self.inner).refetch(AggregateKind::ThreadList).await;
    }

    /// Releases handlers and the user scope. Also done on drop.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for ConversationView {
    fn drop(&mut self) {
        self.inner.close();
    }
}
