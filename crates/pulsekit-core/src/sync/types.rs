//! Core types for event delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts from one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Events taken from the queue for this pass.
    pub attempted: usize,
    /// Events the remote store accepted.
    pub succeeded: usize,
    /// Events left queued for the next pass.
    pub failed: usize,
    /// Events actually removed from the queue.
    pub removed: usize,
}

/// Why a triggered sync did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A prior on-demand sync was triggered within the debounce window.
    Debounced,
    /// The connectivity probe reports no network.
    Offline,
    /// Remote endpoint or identity is incomplete.
    NotConfigured,
    /// Another pass is running.
    AlreadyRunning,
}

/// Result of a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(PassReport),
    Skipped { reason: SkipReason },
}

impl SyncOutcome {
    pub fn report(&self) -> Option<PassReport> {
        match self {
            SyncOutcome::Completed(report) => Some(*report),
            SyncOutcome::Skipped { .. } => None,
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        SyncOutcome::Skipped { reason }
    }
}

/// Current sync status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    /// End of the last completed pass.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Number of events waiting in the queue.
    pub pending_count: usize,
    /// Whether a pass is currently in progress.
    pub in_progress: bool,
    /// Counts from the last completed pass.
    pub last_pass: Option<PassReport>,
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store rejected document ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Remote store not configured")]
    NotConfigured,

    #[error("Rate limited")]
    RateLimited,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let skipped = serde_json::to_value(SyncOutcome::skipped(SkipReason::Debounced)).unwrap();
        assert_eq!(skipped["outcome"], "skipped");
        assert_eq!(skipped["reason"], "debounced");

        let done = SyncOutcome::Completed(PassReport {
            attempted: 3,
            succeeded: 2,
            failed: 1,
            removed: 2,
        });
        assert_eq!(done.report().unwrap().failed, 1);
        let json = serde_json::to_value(done).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["succeeded"], 2);
    }

    #[test]
    fn test_sync_status_default() {
        let status = SyncStatus::default();
        assert!(status.last_sync_at.is_none());
        assert_eq!(status.pending_count, 0);
        assert!(!status.in_progress);
    }
}
