use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff for transient ingest failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
    /// Relative random spread applied to every delay, 0.1 means +-10%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 100,
            multiplier: 2.0,
            max_backoff_ms: 2000,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1 = first retry), without jitter.
    pub fn nominal_backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let nominal = self.nominal_backoff(retry);
        if self.jitter <= 0.0 {
            return nominal;
        }

        let factor = rand::rng().random_range(1.0 - self.jitter..=1.0 + self.jitter);
        nominal.mul_f64(factor.max(0.0))
    }

    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::RetryPolicy;
    use std::time::Duration;

    #[test]
    pub fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.nominal_backoff(1), Duration::from_millis(100));
        assert_eq!(policy.nominal_backoff(2), Duration::from_millis(200));
        assert_eq!(policy.nominal_backoff(3), Duration::from_millis(400));
        assert_eq!(policy.nominal_backoff(10), Duration::from_millis(2000));
    }

    #[test]
    pub fn jitter_stays_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.backoff(2);
            assert!(delay >= Duration::from_millis(180) && delay <= Duration::from_millis(220));
        }
    }

    #[test]
    pub fn attempts_are_bounded() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
