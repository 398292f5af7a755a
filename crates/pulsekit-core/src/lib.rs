//! # Pulsekit Core Library
//!
//! Client-side telemetry pipeline for closed beta tests. It records app
//! sessions, decides when a tester has earned a daily check-in, buffers
//! every event in a durable on-disk queue and delivers the queue to a
//! remote document store in the background.
//!
//! ## Architecture
//!
//! - **Session**: a foreground/background state machine that the host drives
//!   from its UI thread, plus a cooperative heartbeat
//! - **Queue**: a capacity-bounded FIFO persisted as a JSON snapshot after
//!   every mutation; the only state shared with the sync engine
//! - **Sync**: a tokio-based engine that uploads the oldest batch, keeps
//!   failed events for the next pass and never runs two passes at once
//! - **Storage**: SQLite key-value preferences and TOML configuration
//!
//! ## Key Components
//!
//! - [`SdkContext`]: Owns every component for one data directory
//! - [`SessionTracker`]: Session state machine and daily check-in
//! - [`EventQueue`]: Durable event buffer
//! - [`SyncEngine`]: Queue delivery
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod queue;
pub mod session;
pub mod signals;
pub mod storage;
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{SdkBuilder, SdkContext};
pub use error::{ConfigError, CoreError, DatabaseError};
pub use events::{EventType, RemoteDocument, TelemetryEvent};
pub use queue::{EventQueue, EventStamper};
pub use session::{HeartbeatScheduler, LifecycleObserver, SessionState, SessionTracker};
pub use signals::{
    FraudFlagsSource, FraudSignalProvider, Identity, IdentityContext, LiveFraudFlags,
    SharedIdentity,
};
pub use storage::{Config, PrefsStore};
pub use sync::{RemoteStore, SyncEngine, SyncOutcome, SyncStatus};
