//! Fixed-delay throttle.
//!
//! Policy: a fixed pause between consecutive outbound calls, and a
//! longer fixed sleep after an upstream 429 before retrying the same
//! request. Deliberately no exponential backoff, no jitter and no
//! circuit breaker.

use std::time::Duration;

use tracing::warn;

/// Maximum cooldown sleeps for one logical request before giving up.
const MAX_COOLDOWNS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Throttle {
    step_delay: Duration,
    cooldown: Duration,
}

impl Throttle {
    pub fn new(step_delay: Duration, cooldown: Duration) -> Self {
        Self {
            step_delay,
            cooldown,
        }
    }

    /// Throttle sized from engine config (milliseconds / seconds).
    pub fn from_millis(step_delay_ms: u64, cooldown_secs: u64) -> Self {
        Self::new(
            Duration::from_millis(step_delay_ms),
            Duration::from_secs(cooldown_secs),
        )
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Fixed pause between calls.
    pub async fn pace(&self) {
        if self.step_delay > Duration::ZERO {
            tokio::time::sleep(self.step_delay).await;
        }
    }

    /// Fixed sleep after a 429, bounded per logical request.
    ///
    /// Returns false once the budget is spent; the caller surfaces
    /// `AdapterError::RateLimited` then.
    pub async fn cooldown(&self, attempt: u32, context: &str) -> bool {
        if attempt >= MAX_COOLDOWNS {
            return false;
        }
        warn!(
            "Rate limited by {} - sleeping {:?} before retry",
            context, self.cooldown
        );
        tokio::time::sleep(self.cooldown).await;
        true
    }

    pub fn max_cooldowns(&self) -> u32 {
        MAX_COOLDOWNS
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::from_millis(750, 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pace_sleeps_fixed_delay() {
        let throttle = Throttle::new(Duration::from_millis(20), Duration::ZERO);
        let start = std::time::Instant::now();
        throttle.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_zero_delay_does_not_sleep() {
        let throttle = Throttle::new(Duration::ZERO, Duration::ZERO);
        let start = std::time::Instant::now();
        throttle.pace().await;
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_cooldown_budget() {
        let throttle = Throttle::new(Duration::ZERO, Duration::from_millis(1));
        assert!(throttle.cooldown(0, "test").await);
        assert!(throttle.cooldown(2, "test").await);
        assert!(!throttle.cooldown(3, "test").await);
        assert!(!throttle.cooldown(10, "test").await);
    }
}
