//! Wall-clock source shared by the session tracker, queue and sync engine.
//!
//! All timestamps are epoch milliseconds. Calendar day keys (`YYYY-MM-DD`)
//! are derived from the clock so tests can pin both the instant and the day.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_HOUR: i64 = 60 * 60 * MS_PER_SECOND;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;

    /// Calendar day key for `at_ms` in the device's local time zone.
    fn day_key(&self, at_ms: i64) -> String {
        match Local.timestamp_millis_opt(at_ms).single() {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => utc_day_key(at_ms),
        }
    }

    fn today_key(&self) -> String {
        self.day_key(self.now_ms())
    }
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock. Day keys are computed in UTC.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, at_ms: i64) {
        self.now.store(at_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs * MS_PER_SECOND);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn day_key(&self, at_ms: i64) -> String {
        utc_day_key(at_ms)
    }
}

fn utc_day_key(at_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(at_ms)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance_secs(5);
        assert_eq!(clock.now_ms(), 6_000);
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn manual_clock_day_key_is_utc() {
        // 2025-03-01T23:59:59Z
        let clock = ManualClock::new(1_740_873_599_000);
        assert_eq!(clock.today_key(), "2025-03-01");
        clock.advance_secs(1);
        assert_eq!(clock.today_key(), "2025-03-02");
    }
}
