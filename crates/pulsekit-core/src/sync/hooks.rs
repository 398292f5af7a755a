//! Host hooks consulted by the sync engine.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cadence the host should use for background sync invocations.
pub const BACKGROUND_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Network reachability check run before every triggered sync.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Reachability flag the host flips from its own network callbacks.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityProbe for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Host-level periodic job (OS work scheduler, launch agent, ...).
///
/// When it fires, the host should call `SyncEngine::sync_now`. Hosts may
/// defer or coalesce invocations; the engine's debounce absorbs bursts.
pub trait BackgroundScheduler: Send + Sync {
    fn schedule(&self, interval: Duration);
    fn cancel(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl BackgroundScheduler for NoopScheduler {
    fn schedule(&self, _interval: Duration) {}
    fn cancel(&self) {}
}

/// Scheduler that only counts requests; useful for hosts without a job system.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: AtomicUsize,
    cancelled: AtomicUsize,
}

impl RecordingScheduler {
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl BackgroundScheduler for RecordingScheduler {
    fn schedule(&self, interval: Duration) {
        tracing::debug!(interval_secs = interval.as_secs(), "background sync scheduled");
        self.scheduled.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel(&self) {
        tracing::debug!("background sync cancelled");
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}
