//! Delivery of queued events to the remote document store.
//!
//! The engine drains the event queue in batches. Each event becomes one
//! remote document; an event leaves the queue only after the store
//! accepted it, so failures are retried on the next pass.

mod hooks;
pub mod remote;
mod retry;
mod sync_engine;
mod types;

#[cfg(test)]
mod sync_engine_tests;

pub use hooks::{
    AlwaysOnline, BackgroundScheduler, ConnectivityFlag, ConnectivityProbe, NoopScheduler,
    RecordingScheduler, BACKGROUND_SYNC_INTERVAL,
};
pub use remote::{HttpRemoteStore, RemoteStore};
pub use retry::{RetryTracker, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use sync_engine::{SyncDeps, SyncEngine};
pub use types::{PassReport, SkipReason, SyncError, SyncOutcome, SyncStatus};
