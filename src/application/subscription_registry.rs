//! Reference-counted scope membership.
//!
//! Several view contexts can want the same scope (two panels for one
//! patient). The server only needs to hear about the first join and the
//! last leave.
//!
//! ```text
//! join(patient:42)   count 0 -> 1   send join
//! join(patient:42)   count 1 -> 2   (nothing sent)
//! leave(patient:42)  count 2 -> 1   (nothing sent)
//! leave(patient:42)  count 1 -> 0   send leave
//! ```

use std::collections::BTreeMap;

use crate::domain::foundation::ScopeId;

/// Result of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// First consumer; the join must be sent.
    First,
    /// Scope already held; now has this many consumers.
    Shared(usize),
}

/// Result of a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Last consumer left; the leave must be sent.
    Released,
    /// Other consumers remain.
    StillHeld(usize),
    /// The scope was not held.
    NotHeld,
}

/// Scope reference counts.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    counts: BTreeMap<ScopeId, usize>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, scope: ScopeId) -> JoinOutcome {
        let count = self.counts.entry(scope).or_insert(0);
        *count += 1;
        if *count == 1 {
            JoinOutcome::First
        } else {
            JoinOutcome::Shared(*count)
        }
    }

    pub fn leave(&mut self, scope: &ScopeId) -> LeaveOutcome {
        let Some(count) = self.counts.get_mut(scope) else {
            return LeaveOutcome::NotHeld;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(scope);
            LeaveOutcome::Released
        } else {
            LeaveOutcome::StillHeld(*count)
        }
    }

    /// Every held scope, once each, in a stable order.
    pub fn held_scopes(&self) -> Vec<ScopeId> {
        self.counts.keys().cloned().collect()
    }

    /// Consumers currently holding `scope`.
    pub fn consumers(&self, scope: &ScopeId) -> usize {
        self.counts.get(scope).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
