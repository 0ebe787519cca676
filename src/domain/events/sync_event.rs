//! Closed set of inbound events, decoded once at the dispatcher boundary.
//!
//! Handlers never see untyped JSON: a frame either decodes into one of the
//! `SyncEvent` variants below, is ignored because its name is unknown, or is
//! rejected with a `DecodeError`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::payloads::{
    AlertPayload, ClassificationPayload, MedicationPayload, MessagePayload, RecordChangedPayload,
    SchedulePayload,
};
use crate::domain::foundation::{EventId, PatientId, ScopeId};

/// Names of the events this core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    MessageNew,
    MedicationAdded,
    MedicationUpdated,
    MedicationRemoved,
    MedicationAdministered,
    MedicationMissed,
    ScheduleChanged,
    AlertCreated,
    ClassificationCreated,
    RecordChanged,
}

impl EventName {
    /// Every known event name.
    pub const ALL: [EventName; 10] = [
        EventName::MessageNew,
        EventName::MedicationAdded,
        EventName::MedicationUpdated,
        EventName::MedicationRemoved,
        EventName::MedicationAdministered,
        EventName::MedicationMissed,
        EventName::ScheduleChanged,
        EventName::AlertCreated,
        EventName::ClassificationCreated,
        EventName::RecordChanged,
    ];

    /// Medication change events.
    pub const MEDICATION: [EventName; 5] = [
        EventName::MedicationAdded,
        EventName::MedicationUpdated,
        EventName::MedicationRemoved,
        EventName::MedicationAdministered,
        EventName::MedicationMissed,
    ];

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::MessageNew => "message:new",
            EventName::MedicationAdded => "medication:added",
            EventName::MedicationUpdated => "medication:updated",
            EventName::MedicationRemoved => "medication:removed",
            EventName::MedicationAdministered => "medication:administered",
            EventName::MedicationMissed => "medication:missed",
            EventName::ScheduleChanged => "schedule:changed",
            EventName::AlertCreated => "alert:created",
            EventName::ClassificationCreated => "classification:created",
            EventName::RecordChanged => "record:changed",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for names outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event name '{0}'")]
pub struct UnknownEventName(pub String);

impl FromStr for EventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

/// A known event whose payload did not match its schema.
#[derive(Debug, Error)]
#[error("invalid payload for '{event}': {source}")]
pub struct DecodeError {
    pub event: EventName,
    #[source]
    pub source: serde_json::Error,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SyncEvent {
    #[serde(rename = "message:new")]
    MessageNew(MessagePayload),

    #[serde(rename = "medication:added")]
    MedicationAdded(MedicationPayload),

    #[serde(rename = "medication:updated")]
    MedicationUpdated(MedicationPayload),

    #[serde(rename = "medication:removed")]
    MedicationRemoved(MedicationPayload),

    #[serde(rename = "medication:administered")]
    MedicationAdministered(MedicationPayload),

    #[serde(rename = "medication:missed")]
    MedicationMissed(MedicationPayload),

    #[serde(rename = "schedule:changed")]
    ScheduleChanged(SchedulePayload),

    #[serde(rename = "alert:created")]
    AlertCreated(AlertPayload),

    #[serde(rename = "classification:created")]
    ClassificationCreated(ClassificationPayload),

    #[serde(rename = "record:changed")]
    RecordChanged(RecordChangedPayload),
}

impl SyncEvent {
    /// Decodes a raw `(name, payload)` pair.
    ///
    /// Returns `Ok(None)` for names this build does not know about, so newer
    /// servers can add events without breaking older clients.
    pub fn decode(name: &str, payload: JsonValue) -> Result<Option<Self>, DecodeError> {
        let Ok(event) = name.parse::<EventName>() else {
            return Ok(None);
        };
        serde_json::from_value(json!({ "event": name, "data": payload }))
            .map(Some)
            .map_err(|source| DecodeError { event, source })
    }

    /// The event's name.
    pub fn name(&self) -> EventName {
        match self {
            SyncEvent::MessageNew(_) => EventName::MessageNew,
            SyncEvent::MedicationAdded(_) => EventName::MedicationAdded,
            SyncEvent::MedicationUpdated(_) => EventName::MedicationUpdated,
            SyncEvent::MedicationRemoved(_) => EventName::MedicationRemoved,
            SyncEvent::MedicationAdministered(_) => EventName::MedicationAdministered,
            SyncEvent::MedicationMissed(_) => EventName::MedicationMissed,
            SyncEvent::ScheduleChanged(_) => EventName::ScheduleChanged,
            SyncEvent::AlertCreated(_) => EventName::AlertCreated,
            SyncEvent::ClassificationCreated(_) => EventName::ClassificationCreated,
            SyncEvent::RecordChanged(_) => EventName::RecordChanged,
        }
    }

    /// Stable identity of the change, when the event has one.
    pub fn stable_id(&self) -> Option<&EventId> {
        match self {
            SyncEvent::MessageNew(m) => Some(&m.id),
            SyncEvent::MedicationAdded(m)
            | SyncEvent::MedicationUpdated(m)
            | SyncEvent::MedicationRemoved(m)
            | SyncEvent::MedicationAdministered(m)
            | SyncEvent::MedicationMissed(m) => Some(&m.id),
            SyncEvent::AlertCreated(a) => Some(&a.id),
            SyncEvent::ClassificationCreated(c) => Some(&c.id),
            SyncEvent::ScheduleChanged(_) | SyncEvent::RecordChanged(_) => None,
        }
    }

    /// Patient the event concerns, if any.
    pub fn patient_id(&self) -> Option<&PatientId> {
        match self {
            SyncEvent::MessageNew(_) => None,
            SyncEvent::MedicationAdded(m)
            | SyncEvent::MedicationUpdated(m)
            | SyncEvent::MedicationRemoved(m)
            | SyncEvent::MedicationAdministered(m)
            | SyncEvent::MedicationMissed(m) => Some(&m.patient_id),
            SyncEvent::ScheduleChanged(s) => Some(&s.patient_id),
            SyncEvent::AlertCreated(a) => Some(&a.patient_id),
            SyncEvent::ClassificationCreated(c) => Some(&c.patient_id),
            SyncEvent::RecordChanged(r) => r.patient_id.as_ref(),
        }
    }

    /// Scope the server broadcast this event to.
    ///
    /// Messages go to the receiver's personal scope; everything else to the
    /// patient scope.
    pub fn scope(&self) -> Option<ScopeId> {
        match self {
            SyncEvent::MessageNew(m) => Some(ScopeId::user(&m.receiver_id)),
            other => other.patient_id().map(ScopeId::patient),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::AlertSeverity;

    #[test]
    fn event_name_roundtrips_through_str() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>().unwrap(), name);
        }
    }

    #[test]
    fn decode_message_new() {
        let event = SyncEvent::decode(
            "message:new",
            json!({
                "_id": "m1",
                "senderId": "7",
                "receiverId": "9",
                "content": "hello",
                "createdAt": "2024-01-15T10:30:00Z"
            }),
        )
        .unwrap()
        .unwrap();

        assert_eq!(event.name(), EventName::MessageNew);
        assert_eq!(event.stable_id(), Some(&EventId::new("m1")));
        assert_eq!(event.scope().unwrap().to_string(), "user:9");
    }

    #[test]
    fn decode_alert_uses_patient_scope() {
        let event = SyncEvent::decode(
            "alert:created",
            json!({
                "id": "a1",
                "patientId": "42",
                "severity": "critical",
                "title": "SpO2 below threshold",
                "createdAt": "2024-01-15T10:30:00Z"
            }),
        )
        .unwrap()
        .unwrap();

        match &event {
            SyncEvent::AlertCreated(alert) => assert_eq!(alert.severity, AlertSeverity::Critical),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(event.scope().unwrap().to_string(), "patient:42");
    }

    #[test]
    fn decode_unknown_name_is_ignored() {
        let result = SyncEvent::decode("bed:assigned", json!({"bed": 4})).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn decode_bad_payload_reports_event() {
        let err = SyncEvent::decode("medication:added", json!({"id": "x"})).unwrap_err();
        assert_eq!(err.event, EventName::MedicationAdded);
        assert!(err.to_string().contains("medication:added"));
    }

    #[test]
    fn record_changed_has_no_stable_id() {
        let event = SyncEvent::decode("record:changed", json!({"entity": "medications"}))
            .unwrap()
            .unwrap();
        assert!(event.stable_id().is_none());
        assert!(event.scope().is_none());
    }
}
