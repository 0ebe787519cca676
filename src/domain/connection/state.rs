//! Pure connection state machine: `{status, attempt, last_error}`.
//!
//! Every network outcome maps to one transition function returning the next
//! state and, where relevant, what the manager should do next. Nothing here
//! touches a socket or a clock, so the whole retry policy is testable in
//! isolation.

use serde::Serialize;
use std::time::Duration;

use super::{ConnectionStatus, ReconnectPolicy};
use crate::domain::foundation::StateMachine;

/// What the connection manager should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Open a new transport immediately.
    RetryNow,

    /// Wait, then open a new transport.
    RetryAfter(Duration),

    /// Stop retrying and report a terminal error.
    GiveUp,
}

/// Snapshot of one logical connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionState {
    /// Lifecycle status.
    pub status: ConnectionStatus,

    /// Consecutive failed attempts since the last healthy link.
    pub attempt: u32,

    /// Most recent failure, cleared on success.
    pub last_error: Option<String>,
}

impl ConnectionState {
    /// Fresh, disconnected state.
    pub fn new() -> Self {
        Self::default()
    }

    /// An attempt is starting.
    ///
    /// Starting from `Disconnected` or `Errored` is an explicit connect and
    /// begins a fresh attempt budget.
    pub fn begin_attempt(&self) -> Self {
        match self.status {
            ConnectionStatus::Disconnected | ConnectionStatus::Errored => {
                self.moved_to(ConnectionStatus::Connecting, 0, None)
            }
            _ => self.moved_to(ConnectionStatus::Connecting, self.attempt, self.last_error.clone()),
        }
    }

    /// The transport opened. Clears the error.
    ///
    /// The attempt counter survives until the link proves itself through
    /// [`link_healthy`](Self::link_healthy); a server that accepts and then
    /// drops every link must still run out of attempts.
    pub fn connected(&self) -> Self {
        self.moved_to(ConnectionStatus::Connected, self.attempt, None)
    }

    /// The live link delivered a frame or stayed up long enough.
    pub fn link_healthy(&self) -> Self {
        if !self.status.is_connected() {
            return self.clone();
        }
        Self {
            status: self.status,
            attempt: 0,
            last_error: None,
        }
    }

    /// An attempt failed (refused, handshake error, or timed out).
    pub fn attempt_failed(
        &self,
        error: impl Into<String>,
        policy: &ReconnectPolicy,
    ) -> (Self, RetryDecision) {
        self.count_failure(error, policy)
    }

    /// The server closed a live connection on purpose.
    ///
    /// After a healthy link this is not a sign of network trouble, so the
    /// first reconnect happens at once. A link that closes before proving
    /// healthy counts as a failed attempt and backs off like one.
    pub fn server_disconnected(&self, policy: &ReconnectPolicy) -> (Self, RetryDecision) {
        let was_healthy = self.attempt == 0;
        let (next, decision) = self.count_failure("Closed by server", policy);
        match decision {
            RetryDecision::RetryAfter(_) if was_healthy => (next, RetryDecision::RetryNow),
            _ => (next, decision),
        }
    }

    /// A live connection dropped (socket error, abnormal close).
    pub fn transport_lost(
        &self,
        reason: impl Into<String>,
        policy: &ReconnectPolicy,
    ) -> (Self, RetryDecision) {
        self.count_failure(reason, policy)
    }

    /// The owning context tore the connection down.
    pub fn torn_down(&self) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            attempt: 0,
            last_error: self.last_error.clone(),
        }
    }

    /// One more consecutive failure: back off, or give up once the budget is spent.
    fn count_failure(
        &self,
        reason: impl Into<String>,
        policy: &ReconnectPolicy,
    ) -> (Self, RetryDecision) {
        let attempt = self.attempt.saturating_add(1);
        let reason = Some(reason.into());

        if policy.is_exhausted(attempt) {
            (
                self.moved_to(ConnectionStatus::Errored, attempt, reason),
                RetryDecision::GiveUp,
            )
        } else {
            (
                self.moved_to(ConnectionStatus::Connecting, attempt, reason),
                RetryDecision::RetryAfter(policy.delay_for(attempt)),
            )
        }
    }

    fn moved_to(&self, status: ConnectionStatus, attempt: u32, last_error: Option<String>) -> Self {
        debug_assert!(
            self.status.can_transition_to(&status),
            "invalid connection transition {:?} -> {:?}",
            self.status,
            status
        );
        Self {
            status,
            attempt,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_sequence(policy: &ReconnectPolicy) -> Vec<RetryDecision> {
        let mut state = ConnectionState::new().begin_attempt();
        let mut decisions = Vec::new();
        loop {
            let (next, decision) = state.attempt_failed("connection refused", policy);
            decisions.push(decision);
            if decision == RetryDecision::GiveUp {
                assert_eq!(next.status, ConnectionStatus::Errored);
                return decisions;
            }
            state = next.begin_attempt();
        }
    }

    #[test]
    fn new_state_is_disconnected() {
        let state = ConnectionState::new();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.attempt, 0);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn five_failures_give_up_with_growing_delays() {
        let decisions = failing_sequence(&ReconnectPolicy::default());

        assert_eq!(
            decisions,
            vec![
                RetryDecision::RetryAfter(Duration::from_secs(1)),
                RetryDecision::RetryAfter(Duration::from_secs(2)),
                RetryDecision::RetryAfter(Duration::from_secs(3)),
                RetryDecision::RetryAfter(Duration::from_secs(4)),
                RetryDecision::GiveUp,
            ]
        );
    }

    #[test]
    fn delays_never_exceed_cap_with_larger_budget() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            ..ReconnectPolicy::default()
        };
        let mut previous = Duration::ZERO;
        for decision in failing_sequence(&policy) {
            if let RetryDecision::RetryAfter(delay) = decision {
                assert!(delay >= previous);
                assert!(delay <= policy.max_delay);
                previous = delay;
            }
        }
        assert_eq!(previous, Duration::from_secs(5));
    }

    #[test]
    fn healthy_link_resets_attempt_and_error() {
        let policy = ReconnectPolicy::default();
        let (state, _) = ConnectionState::new()
            .begin_attempt()
            .attempt_failed("refused", &policy);
        assert_eq!(state.attempt, 1);

        let state = state.begin_attempt().connected();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.attempt, 1);
        assert!(state.last_error.is_none());

        let state = state.link_healthy();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.attempt, 0);
    }

    #[test]
    fn link_healthy_outside_connected_changes_nothing() {
        let state = ConnectionState::new().begin_attempt();
        assert_eq!(state.link_healthy(), state);
    }

    #[test]
    fn server_disconnect_after_healthy_link_retries_immediately() {
        let policy = ReconnectPolicy::default();
        let state = ConnectionState::new().begin_attempt().connected().link_healthy();
        let (next, decision) = state.server_disconnected(&policy);

        assert_eq!(decision, RetryDecision::RetryNow);
        assert_eq!(next.status, ConnectionStatus::Connecting);
        assert_eq!(next.attempt, 1);
    }

    #[test]
    fn links_closed_before_proving_healthy_run_out_of_attempts() {
        let policy = ReconnectPolicy::default();
        let mut state = ConnectionState::new().begin_attempt();
        let mut decisions = Vec::new();
        loop {
            let (next, decision) = state.connected().server_disconnected(&policy);
            decisions.push(decision);
            if decision == RetryDecision::GiveUp {
                assert_eq!(next.status, ConnectionStatus::Errored);
                assert_eq!(next.attempt, 5);
                assert_eq!(next.last_error.as_deref(), Some("Closed by server"));
                break;
            }
            state = next.begin_attempt();
        }

        assert_eq!(
            decisions,
            vec![
                RetryDecision::RetryNow,
                RetryDecision::RetryAfter(Duration::from_secs(2)),
                RetryDecision::RetryAfter(Duration::from_secs(3)),
                RetryDecision::RetryAfter(Duration::from_secs(4)),
                RetryDecision::GiveUp,
            ]
        );
    }

    #[test]
    fn transport_loss_waits_base_delay() {
        let policy = ReconnectPolicy::default();
        let state = ConnectionState::new().begin_attempt().connected().link_healthy();
        let (next, decision) = state.transport_lost("connection reset", &policy);

        assert_eq!(decision, RetryDecision::RetryAfter(Duration::from_secs(1)));
        assert_eq!(next.last_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn repeated_transport_loss_gives_up() {
        let policy = ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        };
        let (state, _) = ConnectionState::new()
            .begin_attempt()
            .connected()
            .transport_lost("reset", &policy);
        let (state, decision) = state.begin_attempt().connected().transport_lost("reset", &policy);

        assert_eq!(decision, RetryDecision::GiveUp);
        assert_eq!(state.status, ConnectionStatus::Errored);
    }

    #[test]
    fn errored_state_can_start_over() {
        let policy = ReconnectPolicy {
            max_attempts: 1,
            ..ReconnectPolicy::default()
        };
        let (state, decision) = ConnectionState::new()
            .begin_attempt()
            .attempt_failed("refused", &policy);
        assert_eq!(decision, RetryDecision::GiveUp);

        let restarted = state.begin_attempt();
        assert_eq!(restarted.status, ConnectionStatus::Connecting);
        assert_eq!(restarted.attempt, 0);
        assert!(restarted.last_error.is_none());
    }

    #[test]
    fn teardown_resets_to_disconnected() {
        let state = ConnectionState::new().begin_attempt().connected().torn_down();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.attempt, 0);
    }
}
