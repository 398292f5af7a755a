//! Session lifecycle: state machine, daily check-in rule, heartbeat and
//! the foreground/background observer that drives them.

pub mod checkin;
mod heartbeat;
mod lifecycle;
mod tracker;


pub use checkin::{campaign_day_index, CheckinDecision, CheckinRules};
pub use heartbeat::{HeartbeatScheduler, DEFAULT_HEARTBEAT_INTERVAL_SECS};
pub use lifecycle::LifecycleObserver;
pub use tracker::{SessionState, SessionTracker};
