//! Host-provided collaborators consulted while producing events.
//!
//! Device heuristics and identity binding live outside this crate. The core
//! only reads them: fraud signals are logged, flag snapshots are copied into
//! each event, and identity fields are stamped as-is (blank is allowed).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Session-level anomaly detector (e.g. rapid foreground switching).
///
/// Results are advisory. The tracker logs them and never acts on them.
pub trait FraudSignalProvider: Send + Sync {
    /// Called when a session starts. Returns true if the start looks anomalous.
    fn on_session_start(&self, _at_ms: i64) -> bool {
        false
    }

    /// Called when a session ends. Returns true if the duration looks anomalous.
    fn on_session_end(&self, _duration_secs: i64) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoFraudSignals;

impl FraudSignalProvider for NoFraudSignals {}

/// Read accessor for the device's current fraud-flag map.
///
/// Consulted synchronously at every event creation. `None` means the source is
/// unavailable and is treated as an empty map.
pub trait FraudFlagsSource: Send + Sync {
    fn snapshot(&self) -> Option<BTreeMap<String, bool>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFraudFlags;

impl FraudFlagsSource for EmptyFraudFlags {
    fn snapshot(&self) -> Option<BTreeMap<String, bool>> {
        Some(BTreeMap::new())
    }
}

/// Flag map updated by the host whenever its detectors re-run.
#[derive(Debug, Clone, Default)]
pub struct LiveFraudFlags {
    flags: Arc<RwLock<BTreeMap<String, bool>>>,
}

impl LiveFraudFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: bool) {
        if let Ok(mut flags) = self.flags.write() {
            flags.insert(name.into(), value);
        }
    }

    pub fn replace(&self, flags: BTreeMap<String, bool>) {
        if let Ok(mut guard) = self.flags.write() {
            *guard = flags;
        }
    }
}

impl FraudFlagsSource for LiveFraudFlags {
    fn snapshot(&self) -> Option<BTreeMap<String, bool>> {
        self.flags.read().ok().map(|flags| flags.clone())
    }
}

/// Identity fields stamped on every event.
pub trait IdentityContext: Send + Sync {
    fn tester_id(&self) -> String;
    fn device_hash(&self) -> Option<String>;
    fn campaign_id(&self) -> String;
    fn package_name(&self) -> String;

    /// True once the fields the remote store partitions on are present.
    fn is_complete(&self) -> bool {
        !self.tester_id().trim().is_empty() && !self.campaign_id().trim().is_empty()
    }
}

/// Plain identity values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub tester_id: String,
    pub device_hash: Option<String>,
    pub campaign_id: String,
    pub package_name: String,
}

/// Identity the host can fill in after setup completes.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    inner: Arc<RwLock<Identity>>,
}

impl SharedIdentity {
    pub fn new(identity: Identity) -> Self {
        Self {
            inner: Arc::new(RwLock::new(identity)),
        }
    }

    pub fn get(&self) -> Identity {
        self.inner.read().map(|i| i.clone()).unwrap_or_default()
    }

    pub fn update(&self, f: impl FnOnce(&mut Identity)) {
        if let Ok(mut identity) = self.inner.write() {
            f(&mut identity);
        }
    }
}

impl IdentityContext for SharedIdentity {
    fn tester_id(&self) -> String {
        self.get().tester_id
    }

    fn device_hash(&self) -> Option<String> {
        self.get().device_hash
    }

    fn campaign_id(&self) -> String {
        self.get().campaign_id
    }

    fn package_name(&self) -> String {
        self.get().package_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_flags_snapshot_is_a_copy() {
        let flags = LiveFraudFlags::new();
        flags.set("rooted", true);
        let snap = flags.snapshot().unwrap();
        flags.set("rooted", false);
        assert_eq!(snap.get("rooted"), Some(&true));
        assert_eq!(flags.snapshot().unwrap().get("rooted"), Some(&false));
    }

    #[test]
    fn identity_completeness_requires_tester_and_campaign() {
        let identity = SharedIdentity::default();
        assert!(!identity.is_complete());
        identity.update(|i| i.tester_id = "t-1".into());
        assert!(!identity.is_complete());
        identity.update(|i| i.campaign_id = "c-1".into());
        assert!(identity.is_complete());
    }
}
