//! Display-ready aggregates derived from the event stream.
//!
//! - `ConversationProjection` - the open thread
//! - `ThreadListProjector` - most-recent-per-counterparty sidebar
//! - `MedicationSummary` - per-patient medication list and dose totals
//! - `AlertPanel` - open alerts and AI insights
//! - `invalidated_by` - events that force a full re-fetch instead

mod alerts;
mod conversation;
mod medication;
mod refresh;
mod thread_list;

pub use alerts::{AlertPanel, AlertSnapshot, PanelEntry};
pub use conversation::ConversationProjection;
pub use medication::{
    MedicationChange, MedicationEntry, MedicationRecord, MedicationSnapshot, MedicationStatus,
    MedicationSummary,
};
pub use refresh::{invalidated_by, AggregateKind, RefreshSignal};
pub use thread_list::{LastEvent, ThreadListProjector, ThreadSummary, ThreadUpdate};
