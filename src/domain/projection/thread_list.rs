//! Most-recent-per-counterparty conversation list (the messaging sidebar).
//!
//! Ordering: counterparties with at least one message, newest last message
//! first (ties broken by counterparty id); then counterparties with no
//! messages yet, shown with a placeholder, by id.
//!
//! The list is updated per message in O(log n) on the number of
//! counterparties and never recomputed from message history.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use crate::domain::events::MessagePayload;
use crate::domain::foundation::{EventId, Timestamp, UserId};

/// Longest preview kept per thread, in characters.
const PREVIEW_CHARS: usize = 80;

/// The newest event of a thread, or a placeholder when there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LastEvent {
    Placeholder,
    Message {
        id: EventId,
        preview: String,
        at: Timestamp,
    },
}

impl LastEvent {
    fn from_message(message: &MessagePayload) -> Self {
        LastEvent::Message {
            id: message.id.clone(),
            preview: message.content.chars().take(PREVIEW_CHARS).collect(),
            at: message.created_at,
        }
    }

    /// Timestamp of the event, `None` for a placeholder.
    pub fn at(&self) -> Option<Timestamp> {
        match self {
            LastEvent::Placeholder => None,
            LastEvent::Message { at, .. } => Some(*at),
        }
    }

    fn id(&self) -> Option<&EventId> {
        match self {
            LastEvent::Placeholder => None,
            LastEvent::Message { id, .. } => Some(id),
        }
    }
}

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub counterpart: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub last_event: LastEvent,
}

impl ThreadSummary {
    /// A counterparty with no messages yet.
    pub fn placeholder(counterpart: UserId, display_name: Option<String>) -> Self {
        Self {
            counterpart,
            display_name,
            last_event: LastEvent::Placeholder,
        }
    }
}

/// What recording a message did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadUpdate {
    /// An existing row moved or changed its preview.
    Updated,

    /// The message was older than, or the same as, the row's last event.
    Unchanged,

    /// A row was created for a counterparty the list did not know.
    /// Its display metadata is incomplete until the list is re-fetched.
    NewCounterpart,

    /// The message does not involve the list's owner.
    NotParticipant,
}

type RecencyKey = (Reverse<Timestamp>, UserId);

/// Incrementally maintained conversation list for one user.
#[derive(Debug, Clone)]
pub struct ThreadListProjector {
    me: UserId,
    threads: HashMap<UserId, ThreadSummary>,
    recency: BTreeSet<RecencyKey>,
    placeholders: BTreeSet<UserId>,
}

impl ThreadListProjector {
    /// Empty list owned by `me`.
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            threads: HashMap::new(),
            recency: BTreeSet::new(),
            placeholders: BTreeSet::new(),
        }
    }

    /// List seeded from the authoritative thread page.
    pub fn from_snapshot(me: UserId, snapshot: Vec<ThreadSummary>) -> Self {
        let mut list = Self::new(me);
        list.replace_all(snapshot);
        list
    }

    /// Replaces every row with a fresh authoritative page.
    pub fn replace_all(&mut self, snapshot: Vec<ThreadSummary>) {
        self.threads.clear();
        self.recency.clear();
        self.placeholders.clear();
        for summary in snapshot {
            self.insert_row(summary);
        }
    }

    /// The user whose list this is.
    pub fn owner(&self) -> &UserId {
        &self.me
    }

    /// Shows `counterpart` even without messages (e.g. picked from search).
    ///
    /// No-op if the counterparty is already listed.
    pub fn pin(&mut self, counterpart: UserId, display_name: Option<String>) {
        if self.threads.contains_key(&counterpart) {
            return;
        }
        self.insert_row(ThreadSummary::placeholder(counterpart, display_name));
    }

    /// Folds one message into the list.
    ///
    /// Idempotent: recording the same or an older message again changes
    /// nothing.
    pub fn record_message(&mut self, message: &MessagePayload) -> ThreadUpdate {
        let Some(counterpart) = message.counterpart_of(&self.me).cloned() else {
            return ThreadUpdate::NotParticipant;
        };
        let incoming = LastEvent::from_message(message);

        let Some(existing) = self.threads.get(&counterpart) else {
            let display_name = if message.sender_id == counterpart {
                message.sender_name.clone()
            } else {
                None
            };
            self.insert_row(ThreadSummary {
                counterpart,
                display_name,
                last_event: incoming,
            });
            return ThreadUpdate::NewCounterpart;
        };

        if !Self::supersedes(&incoming, &existing.last_event) {
            return ThreadUpdate::Unchanged;
        }

        let mut summary = existing.clone();
        if summary.display_name.is_none() && message.sender_id == counterpart {
            summary.display_name = message.sender_name.clone();
        }
        summary.last_event = incoming;
        self.remove_row(&counterpart);
        self.insert_row(summary);
        ThreadUpdate::Updated
    }

    /// Rows in display order.
    pub fn ordered(&self) -> Vec<&ThreadSummary> {
        self.recency
            .iter()
            .map(|(_, counterpart)| counterpart)
            .chain(self.placeholders.iter())
            .filter_map(|counterpart| self.threads.get(counterpart))
            .collect()
    }

    pub fn get(&self, counterpart: &UserId) -> Option<&ThreadSummary> {
        self.threads.get(counterpart)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    fn supersedes(incoming: &LastEvent, current: &LastEvent) -> bool {
        match (incoming.at(), current.at()) {
            (Some(_), None) => true,
            (Some(new_at), Some(old_at)) => {
                new_at > old_at || (new_at == old_at && incoming.id() > current.id())
            }
            (None, _) => false,
        }
    }

    fn insert_row(&mut self, summary: ThreadSummary) {
        if self.threads.contains_key(&summary.counterpart) {
            self.remove_row(&summary.counterpart.clone());
        }
        match summary.last_event.at() {
            Some(at) => {
                self.recency.insert((Reverse(at), summary.counterpart.clone()));
            }
            None => {
                self.placeholders.insert(summary.counterpart.clone());
            }
        }
        self.threads.insert(summary.counterpart.clone(), summary);
    }

    fn remove_row(&mut self, counterpart: &UserId) {
        if let Some(old) = self.threads.remove(counterpart) {
            match old.last_event.at() {
                Some(at) => {
                    self.recency.remove(&(Reverse(at), counterpart.clone()));
                }
                None => {
                    self.placeholders.remove(counterpart);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> UserId {
        UserId::new("me")
    }

    fn message(id: &str, from: &str, to: &str, at: u64) -> MessagePayload {
        MessagePayload {
            id: EventId::new(id),
            sender_id: UserId::new(from),
            receiver_id: UserId::new(to),
            content: format!("message {}", id),
            created_at: Timestamp::from_unix_secs(at),
            sender_name: None,
        }
    }

    fn order(list: &ThreadListProjector) -> Vec<&str> {
        list.ordered().iter().map(|t| t.counterpart.as_str()).collect()
    }

    #[test]
    fn orders_by_recency_with_placeholders_last() {
        let mut list = ThreadListProjector::new(me());
        list.pin(UserId::new("Z"), Some("Zed".to_string()));
        list.record_message(&message("m1", "X", "me", 10));
        list.record_message(&message("m2", "me", "Y", 20));

        assert_eq!(order(&list), vec!["Y", "X", "Z"]);
        assert_eq!(
            list.get(&UserId::new("Z")).unwrap().last_event,
            LastEvent::Placeholder
        );
    }

    #[test]
    fn newer_message_moves_thread_to_top() {
        let mut list = ThreadListProjector::new(me());
        list.record_message(&message("m1", "X", "me", 10));
        list.record_message(&message("m2", "Y", "me", 20));
        assert_eq!(list.record_message(&message("m3", "me", "X", 30)), ThreadUpdate::Updated);

        assert_eq!(order(&list), vec!["X", "Y"]);
    }

    #[test]
    fn recording_same_message_twice_is_unchanged() {
        let mut list = ThreadListProjector::new(me());
        list.record_message(&message("m1", "X", "me", 10));
        assert_eq!(list.record_message(&message("m1", "X", "me", 10)), ThreadUpdate::Unchanged);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn older_message_does_not_replace_preview() {
        let mut list = ThreadListProjector::new(me());
        list.record_message(&message("m2", "X", "me", 20));
        assert_eq!(list.record_message(&message("m1", "X", "me", 10)), ThreadUpdate::Unchanged);

        match &list.get(&UserId::new("X")).unwrap().last_event {
            LastEvent::Message { id, .. } => assert_eq!(id.as_str(), "m2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn first_message_promotes_pinned_placeholder() {
        let mut list = ThreadListProjector::new(me());
        list.pin(UserId::new("Z"), None);
        assert_eq!(list.record_message(&message("m1", "me", "Z", 5)), ThreadUpdate::Updated);
        assert_eq!(list.get(&UserId::new("Z")).unwrap().last_event.at(), Some(Timestamp::from_unix_secs(5)));
    }

    #[test]
    fn unknown_counterparty_is_flagged() {
        let mut list = ThreadListProjector::new(me());
        assert_eq!(
            list.record_message(&message("m1", "Q", "me", 5)),
            ThreadUpdate::NewCounterpart
        );
    }

    #[test]
    fn messages_between_others_are_ignored() {
        let mut list = ThreadListProjector::new(me());
        assert_eq!(
            list.record_message(&message("m1", "A", "B", 5)),
            ThreadUpdate::NotParticipant
        );
        assert!(list.is_empty());
    }

    #[test]
    fn equal_timestamps_break_ties_by_counterparty() {
        let mut list = ThreadListProjector::new(me());
        list.record_message(&message("m1", "B", "me", 10));
        list.record_message(&message("m2", "A", "me", 10));
        assert_eq!(order(&list), vec!["A", "B"]);
    }

    #[test]
    fn pin_does_not_clobber_existing_thread() {
        let mut list = ThreadListProjector::new(me());
        list.record_message(&message("m1", "X", "me", 10));
        list.pin(UserId::new("X"), Some("Xavier".to_string()));
        assert!(list.get(&UserId::new("X")).unwrap().last_event.at().is_some());
    }

    #[test]
    fn replace_all_resets_rows() {
        let mut list = ThreadListProjector::new(me());
        list.record_message(&message("m1", "X", "me", 10));
        list.replace_all(vec![ThreadSummary::placeholder(UserId::new("W"), None)]);
        assert_eq!(order(&list), vec!["W"]);
    }
}
