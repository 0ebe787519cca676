//! Domain layer containing the synchronization model.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, state machine trait)
//! - `connection` - Connection status, retry policy and state machine
//! - `events` - Closed set of inbound events
//! - `reconciliation` - Seen-id sets and the identity check in front of projections
//! - `projection` - Aggregates shown by the dashboard

pub mod connection;
pub mod events;
pub mod foundation;
pub mod projection;
pub mod reconciliation;
