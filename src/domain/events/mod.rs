//! Inbound event vocabulary.
//!
//! - `SyncEvent` - tagged enum, one variant per event name
//! - `EventName` - the closed set of names, used as dispatcher keys
//! - payload structs for each variant

mod payloads;
mod sync_event;

pub use payloads::{
    AlertPayload, AlertSeverity, ClassificationPayload, MedicationPayload, MessagePayload,
    RecordChangedPayload, SchedulePayload,
};
pub use sync_event::{DecodeError, EventName, SyncEvent, UnknownEventName};
