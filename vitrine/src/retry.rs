//! Backoff policy for revision-conflicted writes.
//!
//! Order mutations run under optimistic concurrency; a webhook and an admin
//! edit can race on the same order. The loser reloads and reapplies, and
//! this module decides how long it waits between attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration for revision conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub base_delay: Duration,
    /// Cap on the exponential backoff.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to jitter delays to avoid lock-step retries.
    pub use_jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryStrategy {
    /// A strategy that never retries; the first conflict surfaces to the
    /// caller.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            use_jitter: false,
        }
    }

    /// Delay before the given retry attempt (attempt 0 is the first try and
    /// never waits).
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.base_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = std::cmp::min(Duration::from_millis(delay_ms as u64), self.max_delay);

        if self.use_jitter {
            add_jitter(capped)
        } else {
            capped
        }
    }
}

#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn add_jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let jitter_factor = rand::rng().random_range(0.8..1.2);
    let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    Duration::from_millis(jittered_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_never_waits() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn backoff_grows_until_the_cap() {
        let strategy = RetryStrategy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_multiplier: 2.0,
            use_jitter: false,
        };

        assert_eq!(strategy.delay_for(1), Duration::from_millis(100));
        assert_eq!(strategy.delay_for(2), Duration::from_millis(200));
        // 400ms capped at 350ms
        assert_eq!(strategy.delay_for(3), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let strategy = RetryStrategy {
            use_jitter: true,
            backoff_multiplier: 1.0,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(1000),
            max_attempts: 2,
        };

        for _ in 0..50 {
            let delay = strategy.delay_for(1).as_millis();
            assert!((800..=1200).contains(&delay), "delay {delay}ms out of range");
        }
    }

    #[test]
    fn none_strategy_is_single_shot() {
        let strategy = RetryStrategy::none();
        assert_eq!(strategy.max_attempts, 1);
    }
}
