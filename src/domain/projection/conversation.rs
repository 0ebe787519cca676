//! The open conversation with one counterparty.

use crate::domain::events::MessagePayload;
use crate::domain::foundation::{EventId, UserId};
use crate::domain::reconciliation::{Identified, Projection};

impl Identified for MessagePayload {
    fn stable_id(&self) -> &EventId {
        &self.id
    }
}

/// Messages exchanged with one counterparty, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationProjection {
    counterpart: UserId,
    messages: Vec<MessagePayload>,
}

impl ConversationProjection {
    pub fn new(counterpart: UserId) -> Self {
        Self {
            counterpart,
            messages: Vec::new(),
        }
    }

    pub fn counterpart(&self) -> &UserId {
        &self.counterpart
    }

    pub fn messages(&self) -> &[MessagePayload] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Projection for ConversationProjection {
    type Entry = MessagePayload;

    fn apply(&mut self, entry: MessagePayload) {
        // Almost always the newest message; only late echoes walk back.
        let position = self
            .messages
            .iter()
            .rposition(|m| m.created_at <= entry.created_at)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.messages.insert(position, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    fn message(id: &str, at: u64) -> MessagePayload {
        MessagePayload {
            id: EventId::new(id),
            sender_id: UserId::new("me"),
            receiver_id: UserId::new("y"),
            content: format!("text {}", id),
            created_at: Timestamp::from_unix_secs(at),
            sender_name: None,
        }
    }

    #[test]
    fn apply_appends_in_time_order() {
        let mut projection = ConversationProjection::new(UserId::new("y"));
        projection.apply(message("a", 10));
        projection.apply(message("b", 20));

        let ids: Vec<_> = projection.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn late_entry_is_inserted_before_newer_ones() {
        let mut projection = ConversationProjection::new(UserId::new("y"));
        projection.apply(message("a", 10));
        projection.apply(message("c", 30));
        projection.apply(message("b", 20));

        let ids: Vec<_> = projection.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn oldest_entry_goes_first() {
        let mut projection = ConversationProjection::new(UserId::new("y"));
        projection.apply(message("b", 20));
        projection.apply(message("a", 5));

        assert_eq!(projection.messages()[0].id.as_str(), "a");
    }
}
