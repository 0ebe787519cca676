//! Per-patient medication summary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::events::{MedicationPayload, SyncEvent};
use crate::domain::foundation::{EventId, MedicationId, PatientId, Timestamp};
use crate::domain::reconciliation::{Identified, Projection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationStatus {
    Active,
    Removed,
}

/// Current state of one medication as shown in the patient view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub id: MedicationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    pub status: MedicationStatus,
    #[serde(default)]
    pub administered: u32,
    #[serde(default)]
    pub missed: u32,
    pub updated_at: Timestamp,
    /// Id of the newest change already reflected in this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<EventId>,
}

/// Authoritative medication page for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSnapshot {
    pub patient_id: PatientId,
    pub medications: Vec<MedicationRecord>,
}

impl MedicationSnapshot {
    /// Change ids already reflected; used to seed the seen-id set.
    pub fn event_ids(&self) -> impl Iterator<Item = EventId> + '_ {
        self.medications
            .iter()
            .filter_map(|m| m.last_event_id.clone())
    }
}

/// Kind of medication change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedicationChange {
    Added,
    Updated,
    Removed,
    Administered,
    Missed,
}

/// One medication change ready to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicationEntry {
    pub change: MedicationChange,
    pub payload: MedicationPayload,
}

impl MedicationEntry {
    /// Extracts a medication change from an event, if it is one.
    pub fn from_event(event: &SyncEvent) -> Option<Self> {
        let (change, payload) = match event {
            SyncEvent::MedicationAdded(p) => (MedicationChange::Added, p),
            SyncEvent::MedicationUpdated(p) => (MedicationChange::Updated, p),
            SyncEvent::MedicationRemoved(p) => (MedicationChange::Removed, p),
            SyncEvent::MedicationAdministered(p) => (MedicationChange::Administered, p),
            SyncEvent::MedicationMissed(p) => (MedicationChange::Missed, p),
            _ => return None,
        };
        Some(Self {
            change,
            payload: payload.clone(),
        })
    }
}

impl Identified for MedicationEntry {
    fn stable_id(&self) -> &EventId {
        &self.payload.id
    }
}

/// Medication list plus running totals for one patient.
#[derive(Debug, Clone)]
pub struct MedicationSummary {
    patient_id: PatientId,
    records: HashMap<MedicationId, MedicationRecord>,
    /// Per-record `updated_at` from the snapshot; changes at or before it
    /// are already counted.
    baseline: HashMap<MedicationId, Timestamp>,
    active: usize,
    administered_total: u32,
    missed_total: u32,
}

impl MedicationSummary {
    pub fn new(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            records: HashMap::new(),
            baseline: HashMap::new(),
            active: 0,
            administered_total: 0,
            missed_total: 0,
        }
    }

    /// Summary built from the authoritative page.
    pub fn from_snapshot(snapshot: MedicationSnapshot) -> Self {
        let mut summary = Self::new(snapshot.patient_id);
        for record in snapshot.medications {
            summary.administered_total += record.administered;
            summary.missed_total += record.missed;
            if record.status == MedicationStatus::Active {
                summary.active += 1;
            }
            summary.baseline.insert(record.id.clone(), record.updated_at);
            summary.records.insert(record.id.clone(), record);
        }
        summary
    }

    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    pub fn get(&self, id: &MedicationId) -> Option<&MedicationRecord> {
        self.records.get(id)
    }

    /// Medications currently active.
    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn administered_total(&self) -> u32 {
        self.administered_total
    }

    pub fn missed_total(&self) -> u32 {
        self.missed_total
    }

    /// Active medications sorted by name, for display.
    pub fn active_records(&self) -> Vec<&MedicationRecord> {
        let mut active: Vec<_> = self
            .records
            .values()
            .filter(|r| r.status == MedicationStatus::Active)
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        active
    }

    fn set_status(&mut self, id: &MedicationId, status: MedicationStatus) {
        if let Some(record) = self.records.get_mut(id) {
            match (record.status, status) {
                (MedicationStatus::Active, MedicationStatus::Removed) => self.active -= 1,
                (MedicationStatus::Removed, MedicationStatus::Active) => self.active += 1,
                _ => {}
            }
            record.status = status;
        }
    }
}

impl Projection for MedicationSummary {
    type Entry = MedicationEntry;

    fn covers(&self, entry: &MedicationEntry) -> bool {
        self.baseline
            .get(&entry.payload.medication_id)
            .is_some_and(|watermark| entry.payload.occurred_at <= *watermark)
    }

    fn apply(&mut self, entry: MedicationEntry) {
        let MedicationEntry { change, payload } = entry;
        let id = payload.medication_id.clone();

        if !self.records.contains_key(&id) {
            self.records.insert(
                id.clone(),
                MedicationRecord {
                    id: id.clone(),
                    name: payload.name.clone(),
                    dosage: payload.dosage.clone(),
                    status: MedicationStatus::Removed,
                    administered: 0,
                    missed: 0,
                    updated_at: payload.occurred_at,
                    last_event_id: None,
                },
            );
        }

        match change {
            MedicationChange::Added | MedicationChange::Updated => {
                self.set_status(&id, MedicationStatus::Active);
            }
            MedicationChange::Removed => self.set_status(&id, MedicationStatus::Removed),
            MedicationChange::Administered => self.administered_total += 1,
            MedicationChange::Missed => self.missed_total += 1,
        }

        if let Some(record) = self.records.get_mut(&id) {
            if payload.name.is_some() {
                record.name = payload.name;
            }
            if payload.dosage.is_some() {
                record.dosage = payload.dosage;
            }
            match change {
                MedicationChange::Administered => record.administered += 1,
                MedicationChange::Missed => record.missed += 1,
                _ => {}
            }
            if payload.occurred_at > record.updated_at {
                record.updated_at = payload.occurred_at;
            }
            record.last_event_id = Some(payload.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(change: MedicationChange, event: &str, medication: &str) -> MedicationEntry {
        MedicationEntry {
            change,
            payload: MedicationPayload {
                id: EventId::new(event),
                medication_id: MedicationId::new(medication),
                patient_id: PatientId::new("42"),
                name: Some(format!("drug {}", medication)),
                dosage: None,
                occurred_at: Timestamp::from_unix_secs(100),
            },
        }
    }

    #[test]
    fn added_medication_is_active() {
        let mut summary = MedicationSummary::new(PatientId::new("42"));
        summary.apply(entry(MedicationChange::Added, "e1", "med-1"));

        assert_eq!(summary.active_count(), 1);
        assert_eq!(
            summary.get(&MedicationId::new("med-1")).unwrap().status,
            MedicationStatus::Active
        );
    }

    #[test]
    fn removal_decrements_active_count_once() {
        let mut summary = MedicationSummary::new(PatientId::new("42"));
        summary.apply(entry(MedicationChange::Added, "e1", "med-1"));
        summary.apply(entry(MedicationChange::Removed, "e2", "med-1"));
        summary.apply(entry(MedicationChange::Removed, "e3", "med-1"));

        assert_eq!(summary.active_count(), 0);
    }

    #[test]
    fn administered_and_missed_are_counted() {
        let mut summary = MedicationSummary::new(PatientId::new("42"));
        summary.apply(entry(MedicationChange::Added, "e1", "med-1"));
        summary.apply(entry(MedicationChange::Administered, "e2", "med-1"));
        summary.apply(entry(MedicationChange::Missed, "e3", "med-1"));
        summary.apply(entry(MedicationChange::Administered, "e4", "med-1"));

        assert_eq!(summary.administered_total(), 2);
        assert_eq!(summary.missed_total(), 1);
        assert_eq!(summary.get(&MedicationId::new("med-1")).unwrap().administered, 2);
    }

    #[test]
    fn snapshot_totals_are_carried_over() {
        let summary = MedicationSummary::from_snapshot(MedicationSnapshot {
            patient_id: PatientId::new("42"),
            medications: vec![MedicationRecord {
                id: MedicationId::new("med-1"),
                name: Some("Heparin".to_string()),
                dosage: Some("5000 IU".to_string()),
                status: MedicationStatus::Active,
                administered: 3,
                missed: 1,
                updated_at: Timestamp::from_unix_secs(50),
                last_event_id: Some(EventId::new("e9")),
            }],
        });

        assert_eq!(summary.active_count(), 1);
        assert_eq!(summary.administered_total(), 3);
        assert_eq!(summary.active_records()[0].name.as_deref(), Some("Heparin"));
    }

    #[test]
    fn changes_before_snapshot_watermark_are_covered() {
        let mut reconciler = crate::domain::reconciliation::Reconciler::new(
            MedicationSummary::from_snapshot(MedicationSnapshot {
                patient_id: PatientId::new("42"),
                medications: vec![MedicationRecord {
                    id: MedicationId::new("med-1"),
                    name: Some("Heparin".to_string()),
                    dosage: None,
                    status: MedicationStatus::Active,
                    administered: 2,
                    missed: 0,
                    updated_at: Timestamp::from_unix_secs(1_700_000_200),
                    last_event_id: Some(EventId::new("adm-2")),
                }],
            }),
            crate::domain::reconciliation::SeenIdSet::new(16),
        );

        let mut earlier = entry(MedicationChange::Administered, "adm-1", "med-1");
        earlier.payload.occurred_at = Timestamp::from_unix_secs(1_700_000_100);
        assert!(!reconciler.materialize(earlier).is_applied());
        assert_eq!(reconciler.projection().administered_total(), 2);

        let mut later = entry(MedicationChange::Administered, "adm-3", "med-1");
        later.payload.occurred_at = Timestamp::from_unix_secs(1_700_000_300);
        assert!(reconciler.materialize(later).is_applied());
        assert_eq!(reconciler.projection().administered_total(), 3);
    }

    #[test]
    fn medications_added_after_snapshot_have_no_watermark() {
        let summary = MedicationSummary::new(PatientId::new("42"));
        assert!(!summary.covers(&entry(MedicationChange::Added, "e1", "med-7")));
    }

    #[test]
    fn from_event_ignores_other_events() {
        let event = SyncEvent::RecordChanged(crate::domain::events::RecordChangedPayload {
            entity: "medications".to_string(),
            patient_id: None,
        });
        assert!(MedicationEntry::from_event(&event).is_none());
    }
}
