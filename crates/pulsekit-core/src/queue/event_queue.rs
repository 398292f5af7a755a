//! Durable, capacity-bounded event queue.
//!
//! The queue is the only state shared between UI-side producers (session
//! tracker, heartbeat) and the background sync engine. One mutex guards the
//! in-memory list, and every mutation rewrites the full JSON snapshot while
//! the lock is still held, so a reader never sees a list that disagrees with
//! what is on disk.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::clock::Clock;
use crate::events::{EventType, TelemetryEvent};
use crate::signals::{FraudFlagsSource, IdentityContext};

pub const DEFAULT_CAPACITY: usize = 1000;
pub const QUEUE_FILE: &str = "event_queue.json";

/// Builds events from the current identity context and fraud-flag snapshot.
#[derive(Clone)]
pub struct EventStamper {
    pub identity: Arc<dyn IdentityContext>,
    pub fraud_flags: Arc<dyn FraudFlagsSource>,
    pub clock: Arc<dyn Clock>,
}

impl EventStamper {
    pub fn stamp(
        &self,
        event_type: EventType,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> TelemetryEvent {
        TelemetryEvent {
            id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: self.clock.now_ms(),
            tester_id: self.identity.tester_id(),
            device_hash: self.identity.device_hash(),
            campaign_id: self.identity.campaign_id(),
            package_name: self.identity.package_name(),
            data,
            fraud_flags: self.fraud_flags.snapshot().unwrap_or_default(),
        }
    }
}

/// Persisted FIFO buffer of events awaiting delivery.
pub struct EventQueue {
    events: Mutex<VecDeque<TelemetryEvent>>,
    capacity: usize,
    /// `None` keeps the queue in memory only.
    queue_file: Option<PathBuf>,
    stamper: EventStamper,
}

impl EventQueue {
    /// Open the queue backed by `queue_file`, rehydrating any persisted snapshot.
    pub fn open(queue_file: impl Into<PathBuf>, capacity: usize, stamper: EventStamper) -> Self {
        let queue_file = queue_file.into();
        let events = load_snapshot(&queue_file, capacity.max(1));
        tracing::debug!(path = %queue_file.display(), count = events.len(), "event queue loaded");
        Self {
            events: Mutex::new(events),
            capacity: capacity.max(1),
            queue_file: Some(queue_file),
            stamper,
        }
    }

    /// Create a queue that is never written to disk.
    pub fn in_memory(capacity: usize, stamper: EventStamper) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            queue_file: None,
            stamper,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stamper(&self) -> &EventStamper {
        &self.stamper
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TelemetryEvent>> {
        // A panic mid-mutation leaves a list that is still structurally valid.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stamp a new event and append it, evicting the oldest entry if full.
    ///
    /// Returns a copy of the stored event.
    pub fn log_event(
        &self,
        event_type: EventType,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> TelemetryEvent {
        let event = self.stamper.stamp(event_type, data);
        self.enqueue(event.clone());
        event
    }

    /// Append an already-built event. Duplicate ids are ignored.
    pub fn enqueue(&self, event: TelemetryEvent) {
        let mut events = self.lock();
        if events.iter().any(|e| e.id == event.id) {
            tracing::warn!(id = %event.id, "ignoring event with duplicate id");
            return;
        }
        if events.len() >= self.capacity {
            if let Some(evicted) = events.pop_front() {
                tracing::warn!(
                    id = %evicted.id,
                    event_type = %evicted.event_type,
                    "event queue full, dropping oldest event"
                );
            }
        }
        tracing::debug!(id = %event.id, event_type = %event.event_type, "event queued");
        events.push_back(event);
        self.persist_locked(&events);
    }

    /// Oldest-first copy of pending events, optionally capped at `limit`.
    pub fn pending_events(&self, limit: Option<usize>) -> Vec<TelemetryEvent> {
        let events = self.lock();
        let take = limit.unwrap_or(events.len());
        events.iter().take(take).cloned().collect()
    }

    /// Remove every event whose id is in `ids`, wherever it sits.
    ///
    /// Returns the number of events removed.
    pub fn remove_events(&self, ids: &[String]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut events = self.lock();
        let before = events.len();
        events.retain(|e| !wanted.contains(e.id.as_str()));
        let removed = before - events.len();
        if removed > 0 {
            self.persist_locked(&events);
        }
        removed
    }

    /// Drop every pending event.
    pub fn clear(&self) {
        let mut events = self.lock();
        events.clear();
        self.persist_locked(&events);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn persist_locked(&self, events: &VecDeque<TelemetryEvent>) {
        let Some(path) = &self.queue_file else {
            return;
        };
        if let Err(e) = write_snapshot(path, events) {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist event queue");
        }
    }
}

fn write_snapshot(path: &Path, events: &VecDeque<TelemetryEvent>) -> Result<(), std::io::Error> {
    let data = serde_json::to_vec(events)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read the persisted snapshot. Bad records are skipped individually; an
/// unreadable document yields an empty queue.
fn load_snapshot(path: &Path, capacity: usize) -> VecDeque<TelemetryEvent> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return VecDeque::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read event queue");
            return VecDeque::new();
        }
    };

    let records = match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(serde_json::Value::Array(records)) => records,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "event queue snapshot is not an array");
            return VecDeque::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "event queue snapshot is corrupt");
            return VecDeque::new();
        }
    };

    let mut seen = HashSet::new();
    let mut events = VecDeque::with_capacity(records.len().min(capacity));
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<TelemetryEvent>(record) {
            Ok(event) => {
                if seen.insert(event.id.clone()) {
                    events.push_back(event);
                }
            }
            Err(e) => tracing::warn!(index, error = %e, "skipping malformed queued event"),
        }
    }
    while events.len() > capacity {
        events.pop_front();
    }
    events
}
