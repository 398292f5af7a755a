//! Session state machine.
//!
//! Tracks whether the app is in the foreground, accumulates per-launch and
//! per-day usage, and emits lifecycle events into the durable queue. Runs on
//! the host's UI thread; every method is synchronous and returns quickly.
//!
//! ## State Transitions
//!
//! ```text
//! Inactive --start_session--> Active --pause_session--> Inactive
//! ```
//!
//! The session start is persisted so a session cut short by process death is
//! adopted again on the next launch (without a second `app_open`).

use serde_json::json;
use std::sync::Arc;

use super::checkin::{CheckinDecision, CheckinRules};
use crate::clock::{Clock, MS_PER_SECOND};
use crate::events::{EventType, TelemetryEvent};
use crate::queue::EventQueue;
use crate::signals::FraudSignalProvider;
use crate::storage::{DailyDuration, PrefsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Active,
}

/// Core session tracker.
pub struct SessionTracker {
    queue: Arc<EventQueue>,
    prefs: Arc<PrefsStore>,
    clock: Arc<dyn Clock>,
    fraud_signals: Arc<dyn FraudSignalProvider>,
    rules: CheckinRules,
    /// Present exactly while the session is active.
    session_start_ms: Option<i64>,
    launch_accumulated_secs: i64,
}

impl SessionTracker {
    /// Create a tracker and adopt any session interrupted by process death.
    pub fn new(
        queue: Arc<EventQueue>,
        prefs: Arc<PrefsStore>,
        clock: Arc<dyn Clock>,
        fraud_signals: Arc<dyn FraudSignalProvider>,
        rules: CheckinRules,
    ) -> Self {
        let mut tracker = Self {
            queue,
            prefs,
            clock,
            fraud_signals,
            rules,
            session_start_ms: None,
            launch_accumulated_secs: 0,
        };
        tracker.restore_session();
        tracker
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        if self.session_start_ms.is_some() {
            SessionState::Active
        } else {
            SessionState::Inactive
        }
    }

    pub fn is_session_active(&self) -> bool {
        self.session_start_ms.is_some()
    }

    pub fn session_start_ms(&self) -> Option<i64> {
        self.session_start_ms
    }

    pub fn launch_accumulated_seconds(&self) -> i64 {
        self.launch_accumulated_secs
    }

    pub fn rules(&self) -> CheckinRules {
        self.rules
    }

    /// Per-launch total plus the live segment of an active session.
    pub fn current_session_duration(&self) -> i64 {
        self.launch_accumulated_secs + self.live_segment_secs(self.clock.now_ms())
    }

    /// Today's persisted total (0 if the stored total belongs to another day).
    pub fn daily_accumulated_seconds(&self) -> i64 {
        self.daily_for(self.clock.now_ms()).seconds
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Adopt a persisted start marker left by an unclean shutdown.
    ///
    /// Returns true if a session was restored.
    pub fn restore_session(&mut self) -> bool {
        if self.session_start_ms.is_some() {
            return false;
        }
        match self.prefs.session_start_ms() {
            Ok(Some(start)) if start > 0 => {
                tracing::info!(session_start_ms = start, "restored interrupted session");
                self.session_start_ms = Some(start);
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session start marker");
                false
            }
        }
    }

    /// Start a session. No-op if one is already active or tracking is off.
    pub fn start_session(&mut self) -> Option<TelemetryEvent> {
        if self.session_start_ms.is_some() {
            return None;
        }
        if !self.tracking_enabled() {
            tracing::debug!("tracking disabled, not starting session");
            return None;
        }

        let now = self.clock.now_ms();
        self.session_start_ms = Some(now);
        if let Err(e) = self.prefs.set_session_start_ms(now) {
            tracing::warn!(error = %e, "failed to persist session start");
        }

        let anomalous = self.fraud_signals.on_session_start(now);
        tracing::info!(session_start_ms = now, anomalous, "session started");

        Some(self.queue.log_event(EventType::AppOpen, serde_json::Map::new()))
    }

    /// Pause the active session and account for its duration.
    ///
    /// Emits `app_close`, then any `daily_checkin`, then `session_duration`.
    /// Returns the emitted events in order; empty if no session was active.
    pub fn pause_session(&mut self) -> Vec<TelemetryEvent> {
        let Some(start) = self.session_start_ms.take() else {
            return Vec::new();
        };
        let now = self.clock.now_ms();
        let duration_secs = (now - start).max(0) / MS_PER_SECOND;

        self.launch_accumulated_secs += duration_secs;
        let mut daily = self.daily_for(now);
        daily.seconds += duration_secs;

        if let Err(e) = self.prefs.clear_session_start() {
            tracing::warn!(error = %e, "failed to clear session start marker");
        }

        let anomalous = self.fraud_signals.on_session_end(duration_secs);
        tracing::info!(duration_secs, daily_secs = daily.seconds, anomalous, "session paused");

        let mut emitted = Vec::with_capacity(3);
        emitted.push(self.queue.log_event(
            EventType::AppClose,
            to_map(json!({ "duration_seconds": duration_secs })),
        ));

        if let Err(e) = self.prefs.set_daily_duration(&daily) {
            tracing::warn!(error = %e, "failed to persist daily duration");
        }

        if let Some(checkin) = self.try_checkin(now, daily.seconds) {
            emitted.push(checkin);
        }

        emitted.push(self.queue.log_event(
            EventType::SessionDuration,
            to_map(json!({
                "duration_seconds": duration_secs,
                "daily_total_seconds": daily.seconds,
            })),
        ));
        emitted
    }

    /// Pause if active, then make sure no start marker survives.
    pub fn end_session(&mut self) -> Vec<TelemetryEvent> {
        let emitted = self.pause_session();
        if let Err(e) = self.prefs.clear_session_start() {
            tracing::warn!(error = %e, "failed to clear session start marker");
        }
        emitted
    }

    /// Evaluate the daily check-in against today's persisted total.
    pub fn check_daily_completion(&mut self) -> Option<TelemetryEvent> {
        let now = self.clock.now_ms();
        let daily = self.daily_for(now).seconds;
        self.try_checkin(now, daily)
    }

    /// Evaluate the daily check-in while a session is running, counting the
    /// live segment toward today's total. No-op when inactive.
    pub fn check_daily_completion_if_active(&mut self) -> Option<TelemetryEvent> {
        if self.session_start_ms.is_none() {
            return None;
        }
        let now = self.clock.now_ms();
        let daily = self.daily_for(now).seconds + self.live_segment_secs(now);
        self.try_checkin(now, daily)
    }

    /// Emit a heartbeat for the active session and re-check daily completion.
    pub fn emit_heartbeat(&mut self) -> Vec<TelemetryEvent> {
        if self.session_start_ms.is_none() {
            return Vec::new();
        }
        let mut emitted = vec![self.queue.log_event(
            EventType::Heartbeat,
            to_map(json!({ "session_duration_seconds": self.current_session_duration() })),
        )];
        if let Some(checkin) = self.check_daily_completion_if_active() {
            emitted.push(checkin);
        }
        emitted
    }

    // ── Internals ────────────────────────────────────────────────────

    fn try_checkin(&mut self, now: i64, daily_seconds: i64) -> Option<TelemetryEvent> {
        let last_checkin = self.prefs.last_checkin_ms().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read last check-in");
            0
        });
        let campaign_start = self.prefs.campaign_start_ms().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read campaign start");
            0
        });

        match self
            .rules
            .evaluate(now, last_checkin, daily_seconds, campaign_start)
        {
            CheckinDecision::Eligible { day_index } => {
                let event = self.queue.log_event(
                    EventType::DailyCheckin,
                    to_map(json!({
                        "day_index": day_index,
                        "daily_seconds": daily_seconds,
                    })),
                );
                if let Err(e) = self.prefs.set_last_checkin_ms(now) {
                    tracing::warn!(error = %e, "failed to persist last check-in");
                }
                tracing::info!(day_index, daily_seconds, "daily check-in recorded");
                Some(event)
            }
            other => {
                tracing::debug!(decision = ?other, "daily check-in not due");
                None
            }
        }
    }

    fn live_segment_secs(&self, now: i64) -> i64 {
        self.session_start_ms
            .map(|start| (now - start).max(0) / MS_PER_SECOND)
            .unwrap_or(0)
    }

    fn daily_for(&self, now: i64) -> DailyDuration {
        let today = self.clock.day_key(now);
        let stored = self.prefs.daily_duration().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read daily duration");
            DailyDuration::default()
        });
        if stored.date_key == today {
            stored
        } else {
            DailyDuration {
                seconds: 0,
                date_key: today,
            }
        }
    }

    fn tracking_enabled(&self) -> bool {
        self.prefs.tracking_enabled().unwrap_or(true)
    }
}

fn to_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}
