//! Per-event retry bookkeeping with capped exponential backoff.

use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
const MAX_BACKOFF_MULTIPLIER: u32 = 8;

/// Counts failed delivery attempts by event id.
///
/// Counters are independent of the queue: a record outlives the event it
/// tracked until `record_success` or `clear` removes it.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    attempts: HashMap<String, u32>,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryTracker {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: HashMap::new(),
            max_attempts,
            base_delay,
        }
    }

    /// Record a failure. Returns true while attempts remain below the maximum.
    pub fn record_failure(&mut self, id: &str) -> bool {
        let count = self.attempts.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count < self.max_attempts
    }

    pub fn record_success(&mut self, id: &str) {
        self.attempts.remove(id);
    }

    pub fn attempts(&self, id: &str) -> u32 {
        self.attempts.get(id).copied().unwrap_or(0)
    }

    /// `base × min(2^attempts, 8)`.
    pub fn retry_delay(&self, id: &str) -> Duration {
        let attempts = self.attempts(id);
        let multiplier = if attempts >= 3 {
            MAX_BACKOFF_MULTIPLIER
        } else {
            (1u32 << attempts).min(MAX_BACKOFF_MULTIPLIER)
        };
        self.base_delay * multiplier
    }

    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }

    pub fn clear(&mut self) {
        self.attempts.clear();
    }
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}
