//! Bounded set of event ids already materialized into a view.

use std::collections::{HashSet, VecDeque};

use crate::domain::foundation::EventId;

/// Default number of ids a context remembers.
pub const DEFAULT_SEEN_CAPACITY: usize = 2048;

/// Identity-only memory of what a view already shows.
///
/// Holds at most `capacity` ids; the oldest inserted id is evicted first.
/// Content is never stored, only identity.
#[derive(Debug, Clone)]
pub struct SeenIdSet {
    ids: HashSet<EventId>,
    order: VecDeque<EventId>,
    capacity: usize,
}

impl SeenIdSet {
    /// Creates an empty set holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: HashSet::with_capacity(capacity.min(DEFAULT_SEEN_CAPACITY)),
            order: VecDeque::with_capacity(capacity.min(DEFAULT_SEEN_CAPACITY)),
            capacity,
        }
    }

    /// Creates a set seeded with every id in a baseline snapshot.
    ///
    /// If the snapshot is larger than `capacity`, the last ids win.
    pub fn seeded<I>(ids: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = EventId>,
    {
        let mut set = Self::new(capacity);
        for id in ids {
            set.insert(id);
        }
        set
    }

    /// Records `id`. Returns `true` if it was not already present.
    pub fn insert(&mut self, id: EventId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        self.order.push_back(id.clone());
        self.ids.insert(id);
        true
    }

    /// True if `id` is currently remembered.
    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    /// Number of remembered ids.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of ids kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.order.clear();
    }
}

impl Default for SeenIdSet {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}
