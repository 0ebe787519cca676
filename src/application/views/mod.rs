//! View contexts - live, reconciled read models for the UI layer.
//!
//! A view context owns its projections, its seen-id sets and its handler
//! registrations. Dropping the context releases all of them; fetches that
//! are still running finish and their results are discarded.
//!
//! - `ConversationView` - the messaging sidebar plus the open thread
//! - `PatientView` - medication summary and alert panel for one patient

mod conversation;
mod patient;

pub use conversation::{ConversationView, MessageDelivery};
pub use patient::PatientView;

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use crate::domain::projection::{AggregateKind, RefreshSignal};

/// Runs re-fetches requested through `signals` until the view is gone.
///
/// Signals that pile up while a fetch runs are coalesced per aggregate.
fn spawn_refresh_worker<T, F, Fut>(
    view: Weak<T>,
    mut signals: mpsc::UnboundedReceiver<RefreshSignal>,
    refetch: F,
) where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, AggregateKind) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        while let Some(first) = signals.recv().await {
            let mut batch = vec![first];
            while let Ok(more) = signals.try_recv() {
                batch.push(more);
            }

            let mut done = HashSet::new();
            for signal in batch {
                if !done.insert(signal.aggregate.clone()) {
                    continue;
                }
                let Some(view) = view.upgrade() else {
                    return;
                };
                tracing::debug!(aggregate = ?signal.aggregate, reason = signal.reason, "Refreshing aggregate");
                refetch(view, signal.aggregate).await;
            }
        }
    });
}
