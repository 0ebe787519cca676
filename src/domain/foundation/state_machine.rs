//! State machine trait for status enums.
//!
//! The connection lifecycle status implements it so that every status
//! change in the connection manager goes through one check.

/// Trait for status enums that represent state machines.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for ConnectionStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Disconnected, Connecting) | (Connecting, Connected))
///     }
/// }
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;
}
