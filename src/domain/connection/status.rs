//! Connection lifecycle status.

use serde::Serialize;
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Where a logical connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No transport; either never connected or torn down.
    #[default]
    Disconnected,

    /// An attempt (first or retry) is underway or scheduled.
    Connecting,

    /// Transport open; sends are delivered.
    Connected,

    /// Retries exhausted. Only an explicit `connect` leaves this state.
    Errored,
}

impl ConnectionStatus {
    /// True when outbound frames can be written.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Errored => "errored",
        };
        write!(f, "{}", s)
    }
}

impl StateMachine for ConnectionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Connecting)
                | (Connecting, Connected)
                | (Connecting, Errored)
                | (Connecting, Disconnected)
                | (Connected, Connecting)
                | (Connected, Errored)
                | (Connected, Disconnected)
                | (Errored, Connecting)
                | (Errored, Disconnected)
        )
    }
}
