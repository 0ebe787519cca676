//! Alert panel: open alert counts plus recent alerts and AI insights.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::domain::events::{AlertPayload, AlertSeverity, ClassificationPayload, SyncEvent};
use crate::domain::foundation::{EventId, PatientId};
use crate::domain::reconciliation::{Identified, Projection};

/// Recent alerts and insights kept for display.
const RECENT_LIMIT: usize = 50;

/// Authoritative alert page for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSnapshot {
    pub patient_id: PatientId,
    #[serde(default)]
    pub alerts: Vec<AlertPayload>,
    #[serde(default)]
    pub classifications: Vec<ClassificationPayload>,
}

impl AlertSnapshot {
    /// Snapshot content as panel entries, oldest first.
    pub fn into_entries(self) -> Vec<PanelEntry> {
        let mut entries: Vec<PanelEntry> = self
            .alerts
            .into_iter()
            .map(PanelEntry::Alert)
            .chain(self.classifications.into_iter().map(PanelEntry::Insight))
            .collect();
        entries.sort_by_key(|e| e.created_at());
        entries
    }
}

/// An entry accepted by the alert panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEntry {
    Alert(AlertPayload),
    Insight(ClassificationPayload),
}

impl PanelEntry {
    pub fn from_event(event: &SyncEvent) -> Option<Self> {
        match event {
            SyncEvent::AlertCreated(a) => Some(PanelEntry::Alert(a.clone())),
            SyncEvent::ClassificationCreated(c) => Some(PanelEntry::Insight(c.clone())),
            _ => None,
        }
    }

    fn created_at(&self) -> crate::domain::foundation::Timestamp {
        match self {
            PanelEntry::Alert(a) => a.created_at,
            PanelEntry::Insight(c) => c.created_at,
        }
    }
}

impl Identified for PanelEntry {
    fn stable_id(&self) -> &EventId {
        match self {
            PanelEntry::Alert(a) => &a.id,
            PanelEntry::Insight(c) => &c.id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertPanel {
    patient_id: PatientId,
    open_by_severity: BTreeMap<AlertSeverity, usize>,
    open_total: usize,
    recent_alerts: VecDeque<AlertPayload>,
    insights: VecDeque<ClassificationPayload>,
}

impl AlertPanel {
    pub fn new(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            open_by_severity: BTreeMap::new(),
            open_total: 0,
            recent_alerts: VecDeque::new(),
            insights: VecDeque::new(),
        }
    }

    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    pub fn open_count(&self) -> usize {
        self.open_total
    }

    pub fn open_with_severity(&self, severity: AlertSeverity) -> usize {
        self.open_by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// Most urgent severity with at least one open alert.
    pub fn highest_severity(&self) -> Option<AlertSeverity> {
        self.open_by_severity
            .iter()
            .rev()
            .find(|(_, count)| **count > 0)
            .map(|(severity, _)| *severity)
    }

    /// Newest first.
    pub fn recent_alerts(&self) -> impl Iterator<Item = &AlertPayload> {
        self.recent_alerts.iter()
    }

    /// Newest first.
    pub fn insights(&self) -> impl Iterator<Item = &ClassificationPayload> {
        self.insights.iter()
    }
}

impl Projection for AlertPanel {
    type Entry = PanelEntry;

    fn apply(&mut self, entry: PanelEntry) {
        match entry {
            PanelEntry::Alert(alert) => {
                *self.open_by_severity.entry(alert.severity).or_insert(0) += 1;
                self.open_total += 1;
                self.recent_alerts.push_front(alert);
                self.recent_alerts.truncate(RECENT_LIMIT);
            }
            PanelEntry::Insight(insight) => {
                self.insights.push_front(insight);
                self.insights.truncate(RECENT_LIMIT);
            }
        }
    }
}
