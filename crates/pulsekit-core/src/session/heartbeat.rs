//! Cooperative heartbeat scheduler.
//!
//! Has no thread of its own: the owner of the UI loop calls `poll()` and
//! emits a heartbeat whenever it returns true. The first beat is due a full
//! interval after `start()`, so opening a session does not produce an
//! immediate redundant heartbeat.

use crate::clock::MS_PER_SECOND;

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    interval_ms: i64,
    running: bool,
    /// Due time of the pending tick; `None` when nothing is scheduled.
    next_due_ms: Option<i64>,
}

impl HeartbeatScheduler {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_ms: interval_secs.max(1) as i64 * MS_PER_SECOND,
            running: false,
            next_due_ms: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        self.next_due_ms
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Begin ticking. Idempotent: a running scheduler keeps its pending tick.
    pub fn start(&mut self, now_ms: i64) {
        if self.running {
            return;
        }
        self.running = true;
        self.next_due_ms = Some(now_ms + self.interval_ms);
    }

    /// Cancel the pending tick.
    pub fn stop(&mut self) {
        self.running = false;
        self.next_due_ms = None;
    }

    /// Returns true if a tick is due. The caller handles the tick, then calls
    /// `reschedule()`; a `stop()` in between prevents the next one.
    pub fn poll(&mut self, now_ms: i64) -> bool {
        match self.next_due_ms {
            Some(due) if self.running && now_ms >= due => {
                self.next_due_ms = None;
                true
            }
            _ => false,
        }
    }

    /// Schedule the next tick one interval after `now_ms`, if still running.
    pub fn reschedule(&mut self, now_ms: i64) {
        if self.running {
            self.next_due_ms = Some(now_ms + self.interval_ms);
        }
    }
}

impl Default for HeartbeatScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL_SECS)
    }
}
