//! Sync engine delivering queued events to the remote store.
//!
//! Two entry points share one pass implementation:
//! - a periodic loop on the engine's runtime, started once and stopped
//!   explicitly;
//! - on-demand `sync_now`, gated by a debounce window, a connectivity check
//!   and a configuration check.
//!
//! Passes are mutually exclusive. Each pass uploads the oldest batch one
//! event at a time, keeps going past individual failures, and removes only
//! the ids the remote store accepted. Delivery is at-least-once: a crash
//! between upload and removal re-sends that event on the next launch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::hooks::{BackgroundScheduler, ConnectivityProbe, BACKGROUND_SYNC_INTERVAL};
use super::remote::RemoteStore;
use super::retry::RetryTracker;
use super::types::{PassReport, SkipReason, SyncOutcome, SyncStatus};
use crate::clock::Clock;
use crate::queue::EventQueue;
use crate::signals::IdentityContext;
use crate::storage::SyncConfig;

/// Collaborators the engine reads from.
#[derive(Clone)]
pub struct SyncDeps {
    pub queue: Arc<EventQueue>,
    pub remote: Arc<dyn RemoteStore>,
    pub connectivity: Arc<dyn ConnectivityProbe>,
    pub identity: Arc<dyn IdentityContext>,
    pub scheduler: Arc<dyn BackgroundScheduler>,
    pub clock: Arc<dyn Clock>,
}

struct PeriodicLoop {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Sync engine managing queue delivery.
pub struct SyncEngine {
    shared: Arc<Shared>,
    runtime: Handle,
    periodic: Mutex<Option<PeriodicLoop>>,
}

struct Shared {
    deps: SyncDeps,
    config: SyncConfig,
    in_progress: AtomicBool,
    last_triggered_ms: Mutex<Option<i64>>,
    retries: Mutex<RetryTracker>,
    status: Mutex<SyncStatus>,
}

/// Clears the in-progress flag when a pass ends, however it ends.
struct PassGuard<'a> {
    shared: &'a Shared,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.shared.in_progress.store(false, Ordering::SeqCst);
        lock(&self.shared.status).in_progress = false;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SyncEngine {
    /// Create an engine that spawns its work on `runtime`.
    pub fn new(deps: SyncDeps, config: SyncConfig, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                deps,
                config,
                in_progress: AtomicBool::new(false),
                last_triggered_ms: Mutex::new(None),
                retries: Mutex::new(RetryTracker::default()),
                status: Mutex::new(SyncStatus::default()),
            }),
            runtime,
            periodic: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Start the periodic loop. Idempotent.
    pub fn start(&self) {
        let mut periodic = lock(&self.periodic);
        if periodic.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let interval = Duration::from_secs(shared.config.interval_secs.max(1));

        let task = self.runtime.spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "sync loop started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick fires immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                // A stalled pass must not shift the next wake.
                tokio::spawn(Arc::clone(&shared).periodic_pass());
            }
            tracing::info!("sync loop stopped");
        });

        self.shared.deps.scheduler.schedule(BACKGROUND_SYNC_INTERVAL);
        *periodic = Some(PeriodicLoop { shutdown, task });
    }

    /// Stop scheduling further passes.
    ///
    /// A pass already running finishes; uploads already sent are not aborted.
    pub fn stop(&self) {
        let Some(periodic) = lock(&self.periodic).take() else {
            return;
        };
        let _ = periodic.shutdown.send(true);
        drop(periodic.task);
        self.shared.deps.scheduler.cancel();
    }

    pub fn is_running(&self) -> bool {
        lock(&self.periodic)
            .as_ref()
            .map(|p| !p.task.is_finished())
            .unwrap_or(false)
    }

    /// On-demand sync: debounce, connectivity and configuration gates, then
    /// one pass.
    pub async fn sync_now(&self) -> SyncOutcome {
        self.shared.sync_now().await
    }

    /// Fire-and-forget `sync_now` for callers on the UI thread.
    pub fn request_sync(&self) {
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            let outcome = shared.sync_now().await;
            tracing::debug!(?outcome, "requested sync finished");
        });
    }

    /// Run one pass with no gates other than the in-progress guard.
    pub async fn run_pass(&self) -> SyncOutcome {
        self.shared.run_pass().await
    }

    pub fn status(&self) -> SyncStatus {
        let mut status = lock(&self.shared.status).clone();
        status.pending_count = self.shared.deps.queue.len();
        status
    }

    /// Failed attempts recorded for `event_id` since its last success.
    pub fn attempts_for(&self, event_id: &str) -> u32 {
        lock(&self.shared.retries).attempts(event_id)
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(periodic) = lock(&self.periodic).take() {
            let _ = periodic.shutdown.send(true);
        }
    }
}

impl Shared {
    async fn sync_now(&self) -> SyncOutcome {
        if !self.claim_debounce() {
            tracing::debug!("sync skipped: debounced");
            return SyncOutcome::skipped(SkipReason::Debounced);
        }
        if let Some(reason) = self.precheck() {
            tracing::debug!(?reason, "sync skipped");
            return SyncOutcome::skipped(reason);
        }
        self.run_pass().await
    }

    async fn periodic_pass(self: Arc<Self>) {
        let outcome = match self.precheck() {
            Some(reason) => SyncOutcome::skipped(reason),
            None => self.run_pass().await,
        };
        match outcome {
            SyncOutcome::Completed(report) => {
                tracing::debug!(?report, "periodic sync pass finished");
            }
            SyncOutcome::Skipped { reason } => {
                tracing::debug!(?reason, "periodic sync pass skipped");
            }
        }
    }

    /// Record this trigger unless one happened within the debounce window.
    fn claim_debounce(&self) -> bool {
        let now = self.deps.clock.now_ms();
        let mut last = lock(&self.last_triggered_ms);
        if let Some(prev) = *last {
            if now - prev < self.config.debounce_ms as i64 {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    fn precheck(&self) -> Option<SkipReason> {
        if !self.deps.connectivity.is_online() {
            return Some(SkipReason::Offline);
        }
        if !self.deps.remote.is_configured() || !self.deps.identity.is_complete() {
            return Some(SkipReason::NotConfigured);
        }
        None
    }

    async fn run_pass(&self) -> SyncOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("sync pass already running, skipping");
            return SyncOutcome::skipped(SkipReason::AlreadyRunning);
        }
        lock(&self.status).in_progress = true;
        let _guard = PassGuard { shared: self };

        let batch = self
            .deps
            .queue
            .pending_events(Some(self.config.max_events_per_batch.max(1)));
        let mut report = PassReport {
            attempted: batch.len(),
            ..PassReport::default()
        };
        if batch.is_empty() {
            self.finish(report);
            return SyncOutcome::Completed(report);
        }

        let mut delivered = Vec::with_capacity(batch.len());
        for event in &batch {
            let document = event.to_remote_document();
            match self
                .deps
                .remote
                .create_document(&self.config.collection, &document)
                .await
            {
                Ok(()) => {
                    lock(&self.retries).record_success(&event.id);
                    delivered.push(event.id.clone());
                }
                Err(e) => {
                    report.failed += 1;
                    let retry_left = lock(&self.retries).record_failure(&event.id);
                    tracing::warn!(
                        id = %event.id,
                        event_type = %event.event_type,
                        error = %e,
                        "event upload failed, keeping it queued"
                    );
                    if !retry_left {
                        tracing::warn!(
                            id = %event.id,
                            attempts = self.attempts(&event.id),
                            "event keeps failing to upload"
                        );
                    }
                }
            }
        }

        report.succeeded = delivered.len();
        report.removed = self.deps.queue.remove_events(&delivered);
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "sync pass finished"
        );
        self.finish(report);
        SyncOutcome::Completed(report)
    }

    fn attempts(&self, id: &str) -> u32 {
        lock(&self.retries).attempts(id)
    }

    fn finish(&self, report: PassReport) {
        let mut status = lock(&self.status);
        status.last_sync_at = Some(Utc::now());
        status.last_pass = Some(report);
    }
}
