//! Payload types carried by inbound events.
//!
//! Field names follow the server's camelCase JSON. Message ids arrive as
//! `_id` from the messaging service and as `id` elsewhere, so both are
//! accepted.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{EventId, MedicationId, PatientId, Timestamp, UserId};

/// A direct message between two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(alias = "_id")]
    pub id: EventId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl MessagePayload {
    /// The participant of this message who is not `me`.
    ///
    /// Returns `None` when `me` took no part in the message.
    pub fn counterpart_of(&self, me: &UserId) -> Option<&UserId> {
        if &self.sender_id == me {
            Some(&self.receiver_id)
        } else if &self.receiver_id == me {
            Some(&self.sender_id)
        } else {
            None
        }
    }

    /// True when the message was exchanged between `a` and `b`.
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender_id == a && &self.receiver_id == b)
            || (&self.sender_id == b && &self.receiver_id == a)
    }
}

/// A change to one medication of a patient.
///
/// `id` identifies the change itself; `medication_id` the record changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationPayload {
    pub id: EventId,
    pub medication_id: MedicationId,
    pub patient_id: PatientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    pub occurred_at: Timestamp,
}

/// Notification that a patient's medication schedule changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePayload {
    pub patient_id: PatientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
}

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A clinical alert raised for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub id: EventId,
    pub patient_id: PatientId,
    pub severity: AlertSeverity,
    pub title: String,
    pub created_at: Timestamp,
}

/// An AI classification (insight) produced for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationPayload {
    pub id: EventId,
    pub patient_id: PatientId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub created_at: Timestamp,
}

/// Coarse notification that some record changed.
///
/// Carries too little to patch a view; receivers re-fetch instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordChangedPayload {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
}
