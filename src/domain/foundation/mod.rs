//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the synchronization core.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{EventId, MedicationId, PatientId, ScopeId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
