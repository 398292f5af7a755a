//! Translates host foreground/background transitions into session calls.

use std::sync::Arc;

use super::heartbeat::HeartbeatScheduler;
use super::tracker::SessionTracker;
use crate::clock::Clock;
use crate::events::TelemetryEvent;

/// Owns the session tracker and heartbeat on the UI thread.
pub struct LifecycleObserver {
    tracker: SessionTracker,
    heartbeat: HeartbeatScheduler,
    clock: Arc<dyn Clock>,
}

impl LifecycleObserver {
    pub fn new(tracker: SessionTracker, heartbeat: HeartbeatScheduler, clock: Arc<dyn Clock>) -> Self {
        let mut observer = Self {
            tracker,
            heartbeat,
            clock,
        };
        // A restored session keeps beating without waiting for a foreground event.
        if observer.tracker.is_session_active() {
            observer.heartbeat.start(observer.clock.now_ms());
        }
        observer
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut SessionTracker {
        &mut self.tracker
    }

    pub fn heartbeat(&self) -> &HeartbeatScheduler {
        &self.heartbeat
    }

    /// App moved to the foreground.
    pub fn on_foreground(&mut self) -> Option<TelemetryEvent> {
        let opened = self.tracker.start_session();
        if self.tracker.is_session_active() {
            self.heartbeat.start(self.clock.now_ms());
        }
        opened
    }

    /// App moved to the background.
    pub fn on_background(&mut self) -> Vec<TelemetryEvent> {
        self.heartbeat.stop();
        self.tracker.pause_session()
    }

    /// Drive the heartbeat. Call from the UI loop; cheap when nothing is due.
    pub fn tick(&mut self) -> Vec<TelemetryEvent> {
        let now = self.clock.now_ms();
        if !self.heartbeat.poll(now) {
            return Vec::new();
        }
        let emitted = self.tracker.emit_heartbeat();
        self.heartbeat.reschedule(now);
        emitted
    }

    /// Stop ticking and close the session for good.
    pub fn shutdown(&mut self) -> Vec<TelemetryEvent> {
        self.heartbeat.stop();
        self.tracker.end_session()
    }
}
