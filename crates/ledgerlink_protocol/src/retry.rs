//! Bounded-retry policy as a plain configured value.
//!
//! Declarative retry in the original deployment becomes an explicit policy
//! object injected at construction: max attempts, exponential backoff
//! schedule, jitter cap. Named per traffic class (one per record kind on
//! the send path, a distinct one for acknowledgement traffic).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default attempt cap on the send path.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default backoff base (ms). Attempt n waits base * 2^(n-1), capped.
const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default backoff cap (ms).
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
/// Default jitter cap (ms), added uniformly on top of the backoff.
const DEFAULT_JITTER_MS: u64 = 100;

/// A named, configured retry policy. Plain data, no behavior swapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Policy name, carried into audit detail (e.g. "contribution-send",
    /// "ack-source").
    pub name: String,
    /// Total attempts including the first one. Never zero.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl RetryPolicy {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_ms: DEFAULT_JITTER_MS,
        }
    }

    /// Backoff before the given retry. `attempt` is 1-based and counts the
    /// attempt that just failed, so the wait before attempt 2 is
    /// `delay_for(1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(backoff + jitter)
    }

    /// Whether another attempt is allowed after `attempt` attempts failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}
