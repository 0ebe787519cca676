//! Patient view: medication summary and alert panel for one patient.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::spawn_refresh_worker;
use crate::application::connection_manager::ConnectionManager;
use crate::application::dispatcher::SubscriptionHandle;
use crate::application::error::SyncError;
use crate::domain::events::{EventName, SyncEvent};
use crate::domain::foundation::{DomainError, EventId, PatientId, ScopeId};
use crate::domain::projection::{
    invalidated_by, AggregateKind, AlertPanel, AlertSnapshot, MedicationEntry, MedicationSnapshot,
    MedicationSummary, PanelEntry, RefreshSignal,
};
use crate::domain::reconciliation::{Identified, Materialization, Projection, Reconciler, SeenIdSet};
use crate::ports::EntityApi;

const HANDLED_EVENTS: [EventName; 9] = [
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

struct State {
    medications: Reconciler<MedicationSummary>,
    alerts: Reconciler<AlertPanel>,
    schedule_revision: u64,
    handles: Vec<SubscriptionHandle>,
    closed: bool,
}

struct Inner {
    patient: PatientId,
    scope: ScopeId,
    api: Arc<dyn EntityApi>,
    manager: ConnectionManager,
    state: Mutex<State>,
    refresh: mpsc::UnboundedSender<RefreshSignal>,
}

fn medication_reconciler(
    snapshot: MedicationSnapshot,
    capacity: usize,
) -> Reconciler<MedicationSummary> {
    let seen = SeenIdSet::seeded(snapshot.event_ids(), capacity);
    Reconciler::new(MedicationSummary::from_snapshot(snapshot), seen)
}

fn alert_panel(snapshot: AlertSnapshot) -> (AlertPanel, Vec<EventId>) {
    let mut panel = AlertPanel::new(snapshot.patient_id.clone());
    let entries = snapshot.into_entries();
    let ids = entries.iter().map(|e| e.stable_id().clone()).collect();
    for entry in entries {
        panel.apply(entry);
    }
    (panel, ids)
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_event(&self, event: &SyncEvent) -> Result<(), DomainError> {
        if event.patient_id() != Some(&self.patient) {
            tracing::trace!(event = %event.name(), patient = %self.patient, "Event for another patient");
            return Ok(());
        }

        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }

        let outcome = if let Some(entry) = MedicationEntry::from_event(event) {
            state.medications.materialize(entry)
        } else if let Some(entry) = PanelEntry::from_event(event) {
            state.alerts.materialize(entry)
        } else {
            if matches!(event, SyncEvent::ScheduleChanged(_)) {
                state.schedule_revision += 1;
            }
            drop(state);
            for aggregate in invalidated_by(event) {
                self.request_refresh(aggregate, event.name().as_str());
            }
            return Ok(());
        };

        if outcome == Materialization::Duplicate {
            tracing::debug!(
                event = %event.name(),
                patient = %self.patient,
                "Duplicate event discarded"
            );
        }
        Ok(())
    }

    fn request_refresh(&self, aggregate: AggregateKind, reason: &'static str) {
        if self.refresh.send(RefreshSignal::new(aggregate, reason)).is_err() {
            tracing::trace!(reason, "Refresh worker gone");
        }
    }

    async fn refetch(self: Arc<Self>, aggregate: AggregateKind) {
        match aggregate {
            AggregateKind::Medications(patient) if patient == self.patient => {
                match self.api.fetch_medications(&patient).await {
                    Ok(snapshot) => {
                        let mut state = self.lock();
                        if state.closed {
                            return;
                        }
                        let ids: Vec<EventId> = snapshot.event_ids().collect();
                        state
                            .medications
                            .reset(MedicationSummary::from_snapshot(snapshot), ids);
                        tracing::debug!(patient = %patient, "Medications refreshed");
                    }
                    Err(e) => {
                        tracing::warn!(patient = %patient, error = %e, "Medication refresh failed");
                    }
                }
            }
            AggregateKind::Alerts(patient) if patient == self.patient => {
                match self.api.fetch_alerts(&patient).await {
                    Ok(snapshot) => {
                        let mut state = self.lock();
                        if state.closed {
                            return;
                        }
                        let (panel, ids) = alert_panel(snapshot);
                        state.alerts.reset(panel, ids);
                        tracing::debug!(patient = %patient, "Alerts refreshed");
                    }
                    Err(e) => {
                        tracing::warn!(patient = %patient, error = %e, "Alert refresh failed");
                    }
                }
            }
            _ => {}
        }
    }

    fn close(&self) {
        let handles = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.handles)
        };
        drop(handles);
        self.manager.leave(&self.scope);
        tracing::debug!(patient = %self.patient, "Patient view closed");
    }
}

/// Live medication and alert state for one patient.
///
/// Joins the patient scope while open. Dropping the view leaves the scope,
/// unregisters its handlers and discards its seen-id sets.
pub struct PatientView {
    inner: Arc<Inner>,
}

impl PatientView {
    /// Loads both baselines and starts listening.
    pub async fn open(
        patient: PatientId,
        api: Arc<dyn EntityApi>,
        manager: ConnectionManager,
        seen_capacity: usize,
    ) -> Result<Self, SyncError> {
        let (medications, alerts) = tokio::join!(
            api.fetch_medications(&patient),
            api.fetch_alerts(&patient)
        );
        let medications = medications.map_err(|e| SyncError::snapshot("medications", e))?;
        let alerts = alerts.map_err(|e| SyncError::snapshot("alerts", e))?;

        let (panel, alert_ids) = alert_panel(alerts);
        let mut alerts = Reconciler::new(
            AlertPanel::new(patient.clone()),
            SeenIdSet::new(seen_capacity),
        );
        alerts.reset(panel, alert_ids);

        let (refresh, signals) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            scope: ScopeId::patient(&patient),
            patient,
            api,
            manager: manager.clone(),
            state: Mutex::new(State {
                medications: medication_reconciler(medications, seen_capacity),
                alerts,
                schedule_revision: 0,
                handles: Vec::new(),
                closed: false,
            }),
            refresh,
        });

        let handles = HANDLED_EVENTS
            .into_iter()
            .map(|event| {
                let view = Arc::downgrade(&inner);
                manager.dispatcher().on_fn(event, "PatientView", move |e| match view.upgrade() {
                    Some(inner) => inner.on_event(e),
                    None => Ok(()),
                })
            })
            .collect();
        inner.lock().handles = handles;
        manager.join(inner.scope.clone());

        spawn_refresh_worker(Arc::downgrade(&inner), signals, Inner::refetch);
        tracing::info!(patient = %inner.patient, "Patient view opened");
        Ok(Self { inner })
    }

    pub fn patient(&self) -> &PatientId {
        &self.inner.patient
    }

    pub fn medications(&self) -> MedicationSummary {
        self.inner.lock().medications.projection().clone()
    }

    pub fn alerts(&self) -> AlertPanel {
        self.inner.lock().alerts.projection().clone()
    }

    /// Bumped on every `schedule:changed`; the UI reloads schedules when it moves.
    pub fn schedule_revision(&self) -> u64 {
        self.inner.lock().schedule_revision
    }

    /// Offers an event from any source to the view.
    pub fn accept(&self, event: &SyncEvent) {
        if let Err(e) = self.inner.on_event(event) {
            tracing::warn!(error = %e, "Patient view rejected event");
        }
    }

    /// Re-fetches both aggregates now.
    pub async fn refresh(&self) {
        let patient = self.inner.patient.clone();
        Arc::clone(&self.inner)
            .refetch(AggregateKind::Medications(patient.clone()))
            .await;
        Arc::clone(&self.inner)
            .refetch(AggregateKind::Alerts(patient))
            .await;
    }

    /// Leaves the scope and releases handlers. Also done on drop.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for PatientView {
    fn drop(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEntityApi, InMemoryTransport};
    use crate::domain::connection::ReconnectPolicy;
    use crate::domain::events::{AlertPayload, AlertSeverity, MedicationPayload, SchedulePayload};
    use crate::domain::foundation::{MedicationId, Timestamp};
    use crate::domain::projection::{MedicationRecord, MedicationStatus};
    use crate::ports::Transport;
    use std::sync::atomic::Ordering;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            Arc::new(InMemoryTransport::new()) as Arc<dyn Transport>,
            "ws://test/ws",
            ReconnectPolicy::default(),
        )
    }

    fn administered(id: &str, patient: &str, medication: &str) -> SyncEvent {
        SyncEvent::MedicationAdministered(MedicationPayload {
            id: EventId::new(id),
            medication_id: MedicationId::new(medication),
            patient_id: PatientId::new(patient),
            name: None,
            dosage: None,
            occurred_at: Timestamp::from_unix_secs(1_700_000_000),
        })
    }

    fn alert(id: &str, patient: &str, severity: AlertSeverity) -> SyncEvent {
        SyncEvent::AlertCreated(AlertPayload {
            id: EventId::new(id),
            patient_id: PatientId::new(patient),
            severity,
            title: "Heart rate above threshold".to_string(),
            created_at: Timestamp::from_unix_secs(1_700_000_100),
        })
    }

    fn snapshot(patient: &str, last_event: &str) -> MedicationSnapshot {
        MedicationSnapshot {
            patient_id: PatientId::new(patient),
            medications: vec![MedicationRecord {
                id: MedicationId::new("amox"),
                name: Some("Amoxicillin".to_string()),
                dosage: Some("500mg".to_string()),
                status: MedicationStatus::Active,
                administered: 2,
                missed: 0,
                updated_at: Timestamp::from_unix_secs(1_699_999_000),
                last_event_id: Some(EventId::new(last_event)),
            }],
        }
    }

    async fn open(
        api: &Arc<InMemoryEntityApi>,
        manager: &ConnectionManager,
        patient: &str,
    ) -> PatientView {
        PatientView::open(
            PatientId::new(patient),
            Arc::clone(api) as Arc<dyn EntityApi>,
            manager.clone(),
            64,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn baseline_events_are_not_applied_twice() {
        let api = Arc::new(InMemoryEntityApi::new("7").with_medications(snapshot("42", "e2")));
        let manager = manager();
        let view = open(&api, &manager, "42").await;

        view.accept(&administered("e2", "42", "amox"));
        assert_eq!(view.medications().administered_total(), 2);

        view.accept(&administered("e3", "42", "amox"));
        view.accept(&administered("e3", "42", "amox"));
        assert_eq!(view.medications().administered_total(), 3);
    }

    #[tokio::test]
    async fn changes_already_counted_in_baseline_are_not_recounted() {
        let mut baseline = snapshot("42", "adm-2");
        baseline.medications[0].updated_at = Timestamp::from_unix_secs(1_700_000_200);
        let api = Arc::new(InMemoryEntityApi::new("7").with_medications(baseline));
        let manager = manager();
        let view = open(&api, &manager, "42").await;

        // Older than the record's updated_at, so already in the count of 2.
        view.accept(&administered("adm-1", "42", "amox"));
        assert_eq!(view.medications().administered_total(), 2);

        let mut refreshed = snapshot("42", "adm-4");
        refreshed.medications[0].administered = 4;
        refreshed.medications[0].updated_at = Timestamp::from_unix_secs(1_700_000_500);
        api.set_medications(refreshed);
        view.refresh().await;
        assert_eq!(view.medications().administered_total(), 4);

        view.accept(&administered("adm-3", "42", "amox"));
        assert_eq!(view.medications().administered_total(), 4);
    }

    #[tokio::test]
    async fn events_for_other_patients_are_ignored() {
        let api = Arc::new(InMemoryEntityApi::new("7"));
        let manager = manager();
        let view = open(&api, &manager, "42").await;

        view.accept(&alert("a1", "43", AlertSeverity::High));
        manager.dispatcher().dispatch(&alert("a2", "43", AlertSeverity::Critical));

        assert_eq!(view.alerts().open_count(), 0);
    }

    #[tokio::test]
    async fn alerts_arrive_through_dispatcher() {
        let api = Arc::new(InMemoryEntityApi::new("7"));
        let manager = manager();
        let view = open(&api, &manager, "42").await;

        manager.dispatcher().dispatch(&alert("a1", "42", AlertSeverity::High));
        manager.dispatcher().dispatch(&alert("a1", "42", AlertSeverity::High));
        manager.dispatcher().dispatch(&alert("a2", "42", AlertSeverity::Critical));

        let panel = view.alerts();
        assert_eq!(panel.open_count(), 2);
        assert_eq!(panel.highest_severity(), Some(AlertSeverity::Critical));
    }

    #[tokio::test]
    async fn schedule_change_refetches_medications() {
        let api = Arc::new(InMemoryEntityApi::new("7").with_medications(snapshot("42", "e2")));
        let manager = manager();
        let view = open(&api, &manager, "42").await;
        assert_eq!(api.calls().medication_fetches.load(Ordering::SeqCst), 1);

        let mut changed = snapshot("42", "e9");
        changed.medications[0].administered = 5;
        api.set_medications(changed);
        view.accept(&SyncEvent::ScheduleChanged(SchedulePayload {
            patient_id: PatientId::new("42"),
            schedule_id: None,
        }));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(view.schedule_revision(), 1);
        assert_eq!(api.calls().medication_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(view.medications().administered_total(), 5);
        // An echo of a change shown before the refresh is still a duplicate.
        view.accept(&administered("e2", "42", "amox"));
        assert_eq!(view.medications().administered_total(), 5);
    }

    #[tokio::test]
    async fn two_views_share_one_scope_join() {
        let api = Arc::new(InMemoryEntityApi::new("7"));
        let manager = manager();
        let first = open(&api, &manager, "42").await;
        let second = open(&api, &manager, "42").await;
        let scope = ScopeId::patient(&PatientId::new("42"));
        assert_eq!(manager.consumers(&scope), 2);

        drop(first);
        assert_eq!(manager.consumers(&scope), 1);
        second.close();
        assert_eq!(manager.consumers(&scope), 0);
        assert_eq!(manager.dispatcher().handler_count(EventName::AlertCreated), 0);
    }
}
