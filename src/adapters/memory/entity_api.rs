//! In-memory entity API for testing.
//!
//! Serves seeded snapshots and assigns sequential ids (`m1`, `m2`, ...) to
//! created messages. Writes can be slowed down or made to fail, and every
//! call is counted for assertions.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::events::MessagePayload;
use crate::domain::foundation::{EventId, PatientId, Timestamp, UserId};
use crate::domain::projection::{AlertSnapshot, MedicationSnapshot, ThreadSummary};
use crate::ports::{ApiError, EntityApi, MessageDraft, UserSummary};

#[derive(Default)]
struct Store {
    conversations: HashMap<UserId, Vec<MessagePayload>>,
    threads: Vec<ThreadSummary>,
    users: Vec<UserSummary>,
    medications: HashMap<PatientId, MedicationSnapshot>,
    alerts: HashMap<PatientId, AlertSnapshot>,
    write_delay: Duration,
    write_failure: Option<ApiError>,
    fetch_delay: Duration,
    next_id: u64,
}

/// Call counters.
#[derive(Debug, Default)]
pub struct ApiCalls {
    pub writes: AtomicUsize,
    pub conversation_fetches: AtomicUsize,
    pub thread_fetches: AtomicUsize,
    pub searches: AtomicUsize,
    pub medication_fetches: AtomicUsize,
    pub alert_fetches: AtomicUsize,
}

/// Entity API backed by in-process maps.
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned. This is acceptable
/// for test code but this adapter should NOT be used in production.
pub struct InMemoryEntityApi {
    me: UserId,
    store: Mutex<Store>,
    calls: ApiCalls,
}

impl InMemoryEntityApi {
    /// API acting on behalf of `me`; created messages are sent by `me`.
    pub fn new(me: impl Into<UserId>) -> Self {
        Self {
            me: me.into(),
            store: Mutex::new(Store::default()),
            calls: ApiCalls::default(),
        }
    }

    pub fn with_conversation(self, counterpart: impl Into<UserId>, messages: Vec<MessagePayload>) -> Self {
        self.store().conversations.insert(counterpart.into(), messages);
        self
    }

    pub fn with_threads(self, threads: Vec<ThreadSummary>) -> Self {
        self.store().threads = threads;
        self
    }

    pub fn with_users(self, users: Vec<UserSummary>) -> Self {
        self.store().users = users;
        self
    }

    pub fn with_medications(self, snapshot: MedicationSnapshot) -> Self {
        self.set_medications(snapshot);
        self
    }

    pub fn with_alerts(self, snapshot: AlertSnapshot) -> Self {
        self.set_alerts(snapshot);
        self
    }

    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.store().write_delay = delay;
        self
    }

    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        self.store().fetch_delay = delay;
        self
    }

    /// Makes every subsequent write fail with `error`.
    pub fn fail_writes(&self, error: ApiError) {
        self.store().write_failure = Some(error);
    }

    /// Replaces a patient's medication page (as a server-side change would).
    pub fn set_medications(&self, snapshot: MedicationSnapshot) {
        self.store()
            .medications
            .insert(snapshot.patient_id.clone(), snapshot);
    }

    pub fn set_alerts(&self, snapshot: AlertSnapshot) {
        self.store().alerts.insert(snapshot.patient_id.clone(), snapshot);
    }

    // === Test Helpers ===

    pub fn calls(&self) -> &ApiCalls {
        &self.calls
    }

    pub fn write_count(&self) -> usize {
        self.calls.writes.load(Ordering::SeqCst)
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().expect("InMemoryEntityApi: store lock poisoned")
    }

    async fn fetch_pause(&self) {
        let delay = self.store().fetch_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl EntityApi for InMemoryEntityApi {
    async fn create_message(&self, draft: &MessageDraft) -> Result<MessagePayload, ApiError> {
        self.calls.writes.fetch_add(1, Ordering::SeqCst);
        let delay = self.store().write_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut store = self.store();
        if let Some(error) = store.write_failure.clone() {
            return Err(error);
        }
        store.next_id += 1;
        let message = MessagePayload {
            id: EventId::new(format!("m{}", store.next_id)),
            sender_id: self.me.clone(),
            receiver_id: draft.receiver_id.clone(),
            content: draft.content.clone(),
            created_at: Timestamp::now(),
            sender_name: None,
        };
        store
            .conversations
            .entry(draft.receiver_id.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn fetch_conversation(&self, counterpart: &UserId) -> Result<Vec<MessagePayload>, ApiError> {
        self.calls.conversation_fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_pause().await;
        Ok(self
            .store()
            .conversations
            .get(counterpart)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_threads(&self) -> Result<Vec<ThreadSummary>, ApiError> {
        self.calls.thread_fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_pause().await;
        Ok(self.store().threads.clone())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ApiError> {
        self.calls.searches.fetch_add(1, Ordering::SeqCst);
        let needle = query.to_lowercase();
        Ok(self
            .store()
            .users
            .iter()
            .filter(|u| u.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn fetch_medications(&self, patient: &PatientId) -> Result<MedicationSnapshot, ApiError> {
        self.calls.medication_fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_pause().await;
        Ok(self
            .store()
            .medications
            .get(patient)
            .cloned()
            .unwrap_or_else(|| MedicationSnapshot {
                patient_id: patient.clone(),
                medications: Vec::new(),
            }))
    }

    async fn fetch_alerts(&self, patient: &PatientId) -> Result<AlertSnapshot, ApiError> {
        self.calls.alert_fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_pause().await;
        Ok(self
            .store()
            .alerts
            .get(patient)
            .cloned()
            .unwrap_or_else(|| AlertSnapshot {
                patient_id: patient.clone(),
                alerts: Vec::new(),
                classifications: Vec::new(),
            }))
    }
}
