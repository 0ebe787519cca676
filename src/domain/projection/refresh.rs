//! Side-channel invalidation: aggregates that must be re-fetched whole.

use crate::domain::events::SyncEvent;
use crate::domain::foundation::PatientId;

/// An aggregate that can be re-fetched from the authoritative source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    /// The messaging sidebar.
    ThreadList,
    /// A patient's medication summary (schedules included).
    Medications(PatientId),
    /// A patient's alert and insight panel.
    Alerts(PatientId),
}

/// Request to re-fetch an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    pub aggregate: AggregateKind,
    pub reason: &'static str,
}

impl RefreshSignal {
    pub fn new(aggregate: AggregateKind, reason: &'static str) -> Self {
        Self { aggregate, reason }
    }
}

/// Aggregates an event invalidates without being able to patch them.
///
/// Events that can be applied incrementally return nothing.
pub fn invalidated_by(event: &SyncEvent) -> Vec<AggregateKind> {
    match event {
        SyncEvent::ScheduleChanged(s) => vec![AggregateKind::Medications(s.patient_id.clone())],
        SyncEvent::RecordChanged(r) => {
            let entity = r.entity.to_ascii_lowercase();
            match (entity.as_str(), r.patient_id.as_ref()) {
                ("message" | "messages" | "user" | "users", _) => vec![AggregateKind::ThreadList],
                ("medication" | "medications" | "schedule" | "schedules", Some(p)) => {
                    vec![AggregateKind::Medications(p.clone())]
                }
                ("alert" | "alerts" | "classification" | "classifications", Some(p)) => {
                    vec![AggregateKind::Alerts(p.clone())]
                }
                (_, Some(p)) => vec![
                    AggregateKind::Medications(p.clone()),
                    AggregateKind::Alerts(p.clone()),
                ],
                (_, None) => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{RecordChangedPayload, SchedulePayload};

    fn record_changed(entity: &str, patient: Option<&str>) -> SyncEvent {
        SyncEvent::RecordChanged(RecordChangedPayload {
            entity: entity.to_string(),
            patient_id: patient.map(PatientId::new),
        })
    }

    #[test]
    fn schedule_change_invalidates_medications() {
        let event = SyncEvent::ScheduleChanged(SchedulePayload {
            patient_id: PatientId::new("42"),
            schedule_id: None,
        });
        assert_eq!(
            invalidated_by(&event),
            vec![AggregateKind::Medications(PatientId::new("42"))]
        );
    }

    #[test]
    fn alert_record_change_invalidates_alerts() {
        assert_eq!(
            invalidated_by(&record_changed("Alerts", Some("42"))),
            vec![AggregateKind::Alerts(PatientId::new("42"))]
        );
    }

    #[test]
    fn unknown_entity_for_patient_invalidates_everything_for_that_patient() {
        assert_eq!(invalidated_by(&record_changed("vitals", Some("42"))).len(), 2);
    }

    #[test]
    fn unknown_entity_without_patient_invalidates_nothing() {
        assert!(invalidated_by(&record_changed("equipment", None)).is_empty());
    }

    #[test]
    fn message_record_change_invalidates_thread_list() {
        assert_eq!(
            invalidated_by(&record_changed("users", None)),
            vec![AggregateKind::ThreadList]
        );
    }
}
