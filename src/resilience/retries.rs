//! Bounded retry policy for optimistic-concurrency conflicts.
//!
//! # Responsibilities
//! - Cap the number of read-decide-write attempts
//! - Space attempts with jittered exponential backoff
//! - Carry the explicit exhaustion policy (fail-open or fail-closed)
//!
//! # Design Decisions
//! - Only concurrency-token mismatches are retried; other store errors are not
//! - Delays are microsecond-scale because the caller runs synchronously on the
//!   request path

use std::time::Duration;

use crate::config::{ExhaustionPolicy, StoreConfig};
use crate::resilience::backoff::calculate_backoff;

/// How many times to retry a conflicting write and what to do afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_us: u64,
    pub max_delay_us: u64,
    pub on_exhausted: ExhaustionPolicy,
}

impl RetryPolicy {
    /// A single attempt with no retries.
    pub fn single_attempt(on_exhausted: ExhaustionPolicy) -> Self {
        Self {
            max_attempts: 1,
            base_delay_us: 0,
            max_delay_us: 0,
            on_exhausted,
        }
    }

    /// Retry up to `max_attempts` times without waiting between attempts.
    pub fn immediate(max_attempts: u32, on_exhausted: ExhaustionPolicy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_us: 0,
            max_delay_us: 0,
            on_exhausted,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_us, self.max_delay_us)
    }

    /// Whether another attempt may follow the given failed attempt (1-based).
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for RetryPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_us: config.base_delay_us,
            max_delay_us: config.max_delay_us,
            on_exhausted: config.on_exhausted,
        }
    }
}
