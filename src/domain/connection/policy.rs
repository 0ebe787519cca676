//! Reconnection policy: linear-growth backoff with a cap.

use std::time::Duration;

/// How reconnection attempts are paced and bounded.
///
/// The delay before retry `n` (1-based count of failed attempts so far) is
/// `min(base_delay * n, max_delay)`. After `max_attempts` failed attempts in
/// a row the manager gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit multiplied by the attempt number.
    ///
    /// Default: 1 second
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    ///
    /// Default: 5 seconds
    pub max_delay: Duration,

    /// Total connection attempts before a terminal error.
    ///
    /// Default: 5 attempts
    pub max_attempts: u32,

    /// An attempt still pending after this long counts as failed.
    ///
    /// Default: 20 seconds
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: 5,
            connect_timeout: Duration::from_secs(20),
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait after `failed_attempts` consecutive failures.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        self.base_delay
            .saturating_mul(failed_attempts.max(1))
            .min(self.max_delay)
    }

    /// True once `failed_attempts` has used up the budget.
    pub fn is_exhausted(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_attempts
    }
}
