//! View context configuration

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ViewsConfig {
    /// Stable ids remembered per projection before the oldest are evicted
    #[serde(default = "default_seen_capacity")]
    pub seen_capacity: usize,
}

impl ViewsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.seen_capacity == 0 {
            return Err(ValidationError::InvalidSeenCapacity);
        }
        Ok(())
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            seen_capacity: default_seen_capacity(),
        }
    }
}

fn default_seen_capacity() -> usize {
    crate::domain::reconciliation::DEFAULT_SEEN_CAPACITY
}
