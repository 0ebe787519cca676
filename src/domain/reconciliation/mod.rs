//! Deduplication and reconciliation of optimistic, confirmed and pushed
//! representations of the same change.

mod reconciler;
mod seen_set;

pub use reconciler::{Identified, Materialization, Projection, Reconciler};
pub use seen_set::{SeenIdSet, DEFAULT_SEEN_CAPACITY};
