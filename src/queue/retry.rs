//! Retry policy - the one place attempt ceilings live.
//!
//! Previously every batch processor hand-rolled its own attempts/ceiling
//! arithmetic against its own column names; this is the shared
//! replacement.

use std::time::Duration;

use crate::adapters::Throttle;
use crate::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts at or above this after a failure fail permanently.
    pub max_attempts: u32,
    /// Fixed delay between items within a batch.
    pub step_delay: Duration,
    /// Fixed sleep on upstream 429 before retrying the same call.
    pub rate_limit_cooldown: Duration,
}

impl RetryPolicy {
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self {
            max_attempts: engine.max_attempts.max(1),
            step_delay: Duration::from_millis(engine.step_delay_ms),
            rate_limit_cooldown: Duration::from_secs(engine.rate_limit_cooldown_secs),
        }
    }

    /// Whether an item that just failed its `attempts`-th claim should
    /// requeue as pending rather than fail permanently.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// The throttle adapters share under this policy.
    pub fn throttle(&self) -> Throttle {
        Throttle::new(self.step_delay, self.rate_limit_cooldown)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
