//! Outbound action pipeline - guarded, validated writes.
//!
//! # Flow
//!
//! ```text
//! submit(draft)
//!   ├─ validate         empty receiver/content -> EmptyPayload
//!   ├─ acquire guard    already in flight      -> AlreadyInFlight
//!   ├─ write (bounded)  error/timeout          -> WriteFailed/WriteTimedOut
//!   └─ reconcile        confirmed entity goes through the view's seen-id set
//! ```
//!
//! The guard is released when the permit drops, on every path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::SyncError;
use super::views::{ConversationView, MessageDelivery};
use crate::domain::events::MessagePayload;
use crate::ports::{EntityApi, MessageDraft};

/// Default bound on one write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// One latch per action class.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    busy: AtomicBool,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the latch, or `None` if a submission already holds it.
    pub fn try_acquire(&self) -> Option<InFlightPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightPermit { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the latch; releases it on drop.
#[derive(Debug)]
pub struct InFlightPermit<'a> {
    guard: &'a InFlightGuard,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

/// Result of a submission that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server accepted the write.
    Confirmed {
        message: MessagePayload,
        delivery: MessageDelivery,
    },
    /// Another submission was still running; nothing was sent.
    AlreadyInFlight,
}

/// Sends messages and folds the confirmed result into the conversation view.
pub struct OutboundPipeline {
    api: Arc<dyn EntityApi>,
    view: Arc<ConversationView>,
    guard: InFlightGuard,
    write_timeout: Duration,
}

impl OutboundPipeline {
    pub fn new(
        api: Arc<dyn EntityApi>,
        view: Arc<ConversationView>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            api,
            view,
            guard: InFlightGuard::new(),
            write_timeout,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.guard.is_busy()
    }

    /// Validates, writes and reconciles one message.
    ///
    /// Never retries; a failed write is reported and the guard released.
    pub async fn submit(&self, draft: MessageDraft) -> Result<SubmitOutcome, SyncError> {
        if draft.receiver_id.as_str().trim().is_empty() {
            return Err(SyncError::EmptyPayload { field: "receiver" });
        }
        if draft.content.trim().is_empty() {
            return Err(SyncError::EmptyPayload { field: "content" });
        }

        let Some(_permit) = self.guard.try_acquire() else {
            tracing::debug!(receiver = %draft.receiver_id, "Send already in flight; ignoring");
            return Ok(SubmitOutcome::AlreadyInFlight);
        };

        let write = self.api.create_message(&draft);
        let message = match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                tracing::warn!(receiver = %draft.receiver_id, error = %e, "Message write failed");
                return Err(SyncError::WriteFailed(e));
            }
            Err(_) => {
                tracing::warn!(
                    receiver = %draft.receiver_id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Message write timed out"
                );
                return Err(SyncError::WriteTimedOut(self.write_timeout));
            }
        };

        let delivery = self.view.accept_message(&message);
        tracing::info!(message_id = %message.id, receiver = %draft.receiver_id, ?delivery, "Message sent");
        Ok(SubmitOutcome::Confirmed { message, delivery })
    }
}
