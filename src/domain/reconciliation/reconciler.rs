//! Identity check in front of a projection.
//!
//! Write confirmations and push echoes of the same change carry the same
//! stable id. Whichever arrives first is applied; the other is discarded.
//! The seen-id set is the idempotency boundary.

use super::SeenIdSet;
use crate::domain::foundation::EventId;

/// Anything carrying the stable id of a real-world change.
pub trait Identified {
    fn stable_id(&self) -> &EventId;
}

/// Derived view state that accepts entries one at a time.
pub trait Projection {
    type Entry: Identified;

    /// Applies one new entry. Called at most once per stable id.
    fn apply(&mut self, entry: Self::Entry);

    /// True when the baseline already reflects `entry` even though its id
    /// was never seen, e.g. a change older than the snapshot's watermark.
    fn covers(&self, _entry: &Self::Entry) -> bool {
        false
    }
}

/// Result of offering an entry to a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// First sighting; the projection changed.
    Applied,

    /// Already represented; nothing changed.
    Duplicate,
}

impl Materialization {
    pub fn is_applied(&self) -> bool {
        matches!(self, Materialization::Applied)
    }
}

/// A projection guarded by its own seen-id set.
#[derive(Debug, Clone)]
pub struct Reconciler<P> {
    seen: SeenIdSet,
    projection: P,
}

impl<P: Projection> Reconciler<P> {
    /// Wraps a projection already holding the snapshot's entries.
    pub fn new(projection: P, seen: SeenIdSet) -> Self {
        Self { seen, projection }
    }

    /// Builds the projection from a baseline snapshot and seeds the seen-id
    /// set with every id in it.
    pub fn from_snapshot<I>(mut projection: P, snapshot: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = P::Entry>,
    {
        let mut seen = SeenIdSet::new(capacity);
        for entry in snapshot {
            if seen.insert(entry.stable_id().clone()) {
                projection.apply(entry);
            }
        }
        Self { seen, projection }
    }

    /// Applies `entry` unless its id was already materialized.
    pub fn materialize(&mut self, entry: P::Entry) -> Materialization {
        if !self.seen.insert(entry.stable_id().clone()) {
            return Materialization::Duplicate;
        }
        if self.projection.covers(&entry) {
            return Materialization::Duplicate;
        }
        self.projection.apply(entry);
        Materialization::Applied
    }

    /// Swaps in a projection rebuilt from a fresh snapshot.
    ///
    /// Ids seen before are kept alongside `ids`, so a late echo of a change
    /// the old projection already showed is still recognized.
    pub fn reset<I>(&mut self, projection: P, ids: I)
    where
        I: IntoIterator<Item = EventId>,
    {
        for id in ids {
            self.seen.insert(id);
        }
        self.projection = projection;
    }

    /// True if `id` is already represented.
    pub fn has_seen(&self, id: &EventId) -> bool {
        self.seen.contains(id)
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn seen(&self) -> &SeenIdSet {
        &self.seen
    }
}
