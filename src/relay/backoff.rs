//! Retry policy: exponential backoff with a cap, and the give-up decision.
//!
//! The policy is a pure function of a message's completed attempt count,
//! so it needs no per-message state and survives the message being
//! re-queued between attempts.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    jitter_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_retries: config.max_retries,
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether a message that has completed `attempt_count` attempts has
    /// exhausted its budget. The budget allows one initial attempt plus
    /// `max_retries` retries.
    pub fn should_give_up(&self, attempt_count: u32) -> bool {
        attempt_count > self.max_retries
    }

    /// Delay before the next attempt, given `attempt_count` completed
    /// attempts: `base * 2^(attempt_count - 1)`, capped at `max_delay`,
    /// with optional jitter.
    pub fn next_delay(&self, attempt_count: u32) -> Duration {
        let exponent = attempt_count.saturating_sub(1).min(20);
        let unclamped_ms = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << exponent);
        let capped_ms = unclamped_ms.min(self.max_delay.as_millis()) as f64;

        let final_ms = if self.jitter_factor > 0.0 {
            let jitter_range = capped_ms * self.jitter_factor;
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            (capped_ms + jitter).max(1.0)
        } else {
            capped_ms.max(1.0)
        };

        Duration::from_millis(final_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64, retries: u32) -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            max_retries: retries,
            base_delay_ms: base_ms,
            max_delay_ms: max_ms,
            jitter_factor: 0.0, // No jitter for predictable testing
        })
    }

    #[test]
    fn test_delays_double_then_cap() {
        let policy = policy(1_000, 8_000, 5);

        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2), Duration::from_secs(2));
        assert_eq!(policy.next_delay(3), Duration::from_secs(4));
        assert_eq!(policy.next_delay(4), Duration::from_secs(8));
        // Capped from here on
        assert_eq!(policy.next_delay(5), Duration::from_secs(8));
        assert_eq!(policy.next_delay(10), Duration::from_secs(8));
    }

    #[test]
    fn test_delays_non_decreasing() {
        let policy = policy(100, 5_000, 10);
        let mut previous = Duration::ZERO;
        for attempt in 1..=12 {
            let delay = policy.next_delay(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_give_up_after_budget() {
        let policy = policy(100, 1_000, 3);

        // 1 initial + 3 retries = 4 total attempts
        assert!(!policy.should_give_up(1));
        assert!(!policy.should_give_up(2));
        assert!(!policy.should_give_up(3));
        assert!(policy.should_give_up(4));
        assert!(policy.should_give_up(5));
    }

    #[test]
    fn test_jitter_stays_bounded() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
            jitter_factor: 0.1,
        });

        for _ in 0..100 {
            let delay = policy.next_delay(1);
            assert!(delay >= Duration::from_millis(900));
            assert!(delay <= Duration::from_millis(1_100));
        }
    }

    #[test]
    fn test_huge_attempt_count_does_not_overflow() {
        let policy = policy(1_000, 60_000, 3);
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(60));
    }
}
