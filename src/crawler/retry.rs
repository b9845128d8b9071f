//! Retry budget and backoff schedule for API fetches
//!
//! The delay starts at the base delay and is multiplied by a random factor in
//! `[1, 2)` after every attempt, never exceeding the ceiling. Delays are
//! therefore non-decreasing.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Retry budget shared by every fetch of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per fetch, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: base_delay.min(max_delay),
            max_delay,
        }
    }

    /// Fresh backoff schedule for one fetch
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.base_delay,
            max: self.max_delay,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Delay schedule of a single fetch
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Returns the delay to sleep now and grows the following one
    pub fn next_delay<R: Rng>(&mut self, rng: &mut R) -> Duration {
        let delay = self.next;
        let factor: f64 = rng.random_range(1.0..2.0);
        self.next = delay.mul_f64(factor).min(self.max);
        delay
    }
}
