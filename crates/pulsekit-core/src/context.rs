//! SDK context wiring every component over one data directory.
//!
//! `SdkBuilder` collects host hooks; `build()` opens the stores, resolves
//! the identity, starts the sync engine and adopts any session interrupted
//! by process death. The engine runs on the host's tokio runtime when one is
//! available; otherwise the context owns a small runtime of its own.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::events::{EventType, TelemetryEvent};
use crate::queue::{EventQueue, EventStamper, QUEUE_FILE};
use crate::session::{CheckinRules, HeartbeatScheduler, LifecycleObserver, SessionTracker};
use crate::signals::{
    EmptyFraudFlags, FraudFlagsSource, FraudSignalProvider, Identity, IdentityContext,
    NoFraudSignals, SharedIdentity,
};
use crate::storage::{data_dir, get_or_create_device_hash, Config, PrefsStore};
use crate::sync::{
    AlwaysOnline, BackgroundScheduler, ConnectivityProbe, HttpRemoteStore, NoopScheduler,
    RemoteStore, SyncDeps, SyncEngine,
};

pub const PREFS_FILE: &str = "prefs.db";

/// Collects host hooks for [`SdkContext`]. Every hook has a default.
pub struct SdkBuilder {
    data_dir: Option<PathBuf>,
    config: Option<Config>,
    clock: Option<Arc<dyn Clock>>,
    remote: Option<Arc<dyn RemoteStore>>,
    fraud_signals: Option<Arc<dyn FraudSignalProvider>>,
    fraud_flags: Option<Arc<dyn FraudFlagsSource>>,
    identity: Option<Arc<dyn IdentityContext>>,
    connectivity: Option<Arc<dyn ConnectivityProbe>>,
    scheduler: Option<Arc<dyn BackgroundScheduler>>,
    runtime: Option<Handle>,
    start_sync: bool,
}

impl Default for SdkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SdkBuilder {
    pub fn new() -> Self {
        Self {
            data_dir: None,
            config: None,
            clock: None,
            remote: None,
            fraud_signals: None,
            fraud_flags: None,
            identity: None,
            connectivity: None,
            scheduler: None,
            runtime: None,
            start_sync: true,
        }
    }

    /// Directory holding prefs, queue snapshot and config.
    /// Defaults to [`data_dir`].
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Use `config` instead of loading `config.toml` from the data directory.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Remote store; defaults to [`HttpRemoteStore`] built from `[sync]`.
    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn fraud_signals(mut self, signals: Arc<dyn FraudSignalProvider>) -> Self {
        self.fraud_signals = Some(signals);
        self
    }

    pub fn fraud_flags(mut self, flags: Arc<dyn FraudFlagsSource>) -> Self {
        self.fraud_flags = Some(flags);
        self
    }

    /// Host-owned identity. When unset the identity is resolved from prefs
    /// and the `[identity]` config section.
    pub fn identity(mut self, identity: Arc<dyn IdentityContext>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(probe);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn BackgroundScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Runtime the sync engine spawns on. Defaults to the current runtime,
    /// if any.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Whether `build()` starts the periodic sync loop. Defaults to true.
    pub fn start_sync(mut self, start: bool) -> Self {
        self.start_sync = start;
        self
    }

    /// Open every store and wire the components together.
    ///
    /// # Errors
    ///
    /// Fails if the data directory, prefs database or config file cannot be
    /// opened, if the configured endpoint is invalid, or if the runtime
    /// cannot be created.
    pub fn build(self) -> Result<SdkContext> {
        let dir = match self.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                dir
            }
            None => data_dir()?,
        };
        let config = match self.config {
            Some(config) => config,
            None => Config::load_from(&Config::path_in(&dir))?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let prefs = Arc::new(PrefsStore::open(&dir.join(PREFS_FILE))?);
        let device_hash = get_or_create_device_hash(&prefs)?;
        let identity: Arc<dyn IdentityContext> = match self.identity {
            Some(identity) => identity,
            None => Arc::new(resolve_identity(&prefs, &config, device_hash)?),
        };

        let stamper = EventStamper {
            identity: identity.clone(),
            fraud_flags: self
                .fraud_flags
                .unwrap_or_else(|| Arc::new(EmptyFraudFlags)),
            clock: clock.clone(),
        };
        let queue = Arc::new(EventQueue::open(
            dir.join(QUEUE_FILE),
            config.queue.capacity,
            stamper,
        ));

        let remote: Arc<dyn RemoteStore> = match self.remote {
            Some(remote) => remote,
            None => Arc::new(HttpRemoteStore::from_config(&config.sync)?),
        };

        let (handle, runtime) = match self.runtime.or_else(|| Handle::try_current().ok()) {
            Some(handle) => (handle, None),
            None => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .thread_name("pulsekit-sync")
                    .enable_all()
                    .build()?;
                (runtime.handle().clone(), Some(runtime))
            }
        };

        let engine = Arc::new(SyncEngine::new(
            SyncDeps {
                queue: queue.clone(),
                remote,
                connectivity: self.connectivity.unwrap_or_else(|| Arc::new(AlwaysOnline)),
                identity: identity.clone(),
                scheduler: self.scheduler.unwrap_or_else(|| Arc::new(NoopScheduler)),
                clock: clock.clone(),
            },
            config.sync.clone(),
            handle.clone(),
        ));
        if self.start_sync {
            engine.start();
        }

        let tracker = SessionTracker::new(
            queue.clone(),
            prefs.clone(),
            clock.clone(),
            self.fraud_signals
                .unwrap_or_else(|| Arc::new(NoFraudSignals)),
            CheckinRules::from(&config.session),
        );
        let lifecycle = LifecycleObserver::new(
            tracker,
            HeartbeatScheduler::new(config.session.heartbeat_interval_secs),
            clock,
        );

        tracing::info!(
            data_dir = %dir.display(),
            pending = queue.len(),
            owned_runtime = runtime.is_some(),
            "pulsekit context ready"
        );

        Ok(SdkContext {
            data_dir: dir,
            config,
            prefs,
            identity,
            queue,
            engine,
            lifecycle,
            handle,
            runtime,
        })
    }
}

/// Resolve identity fields from config and prefs. A tester id in config
/// wins and is remembered in prefs.
fn resolve_identity(
    prefs: &PrefsStore,
    config: &Config,
    device_hash: String,
) -> Result<SharedIdentity> {
    let configured = config.identity.tester_id.trim();
    let tester_id = if configured.is_empty() {
        prefs.tester_id()?.unwrap_or_default()
    } else {
        if prefs.tester_id()?.as_deref() != Some(configured) {
            prefs.set_tester_id(configured)?;
        }
        configured.to_string()
    };

    Ok(SharedIdentity::new(Identity {
        tester_id,
        device_hash: Some(device_hash),
        campaign_id: config.identity.campaign_id.clone(),
        package_name: config.identity.package_name.clone(),
    }))
}

/// Every SDK component, owned in one place.
pub struct SdkContext {
    data_dir: PathBuf,
    config: Config,
    prefs: Arc<PrefsStore>,
    identity: Arc<dyn IdentityContext>,
    queue: Arc<EventQueue>,
    engine: Arc<SyncEngine>,
    lifecycle: LifecycleObserver,
    handle: Handle,
    /// Only set when no host runtime was available at build time.
    runtime: Option<Runtime>,
}

impl SdkContext {
    pub fn builder() -> SdkBuilder {
        SdkBuilder::new()
    }

    pub fn lifecycle(&mut self) -> &mut LifecycleObserver {
        &mut self.lifecycle
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn sync(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn prefs(&self) -> &Arc<PrefsStore> {
        &self.prefs
    }

    pub fn identity(&self) -> &Arc<dyn IdentityContext> {
        &self.identity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    /// Runtime the sync engine runs on.
    pub fn runtime(&self) -> &Handle {
        &self.handle
    }

    /// Record the campaign start used for day indexing.
    pub fn set_campaign_start(&self, at_ms: i64) -> Result<()> {
        self.prefs.set_campaign_start_ms(at_ms)?;
        tracing::info!(at_ms, "campaign start recorded");
        Ok(())
    }

    /// Opt the tester in or out. A running session is left as is.
    pub fn set_tracking_enabled(&self, enabled: bool) -> Result<()> {
        self.prefs.set_tracking_enabled(enabled)?;
        tracing::info!(enabled, "tracking preference changed");
        Ok(())
    }

    /// Queue a custom event; `name` is stored under `data.name`.
    pub fn log_custom_event(
        &self,
        name: &str,
        mut data: serde_json::Map<String, serde_json::Value>,
    ) -> TelemetryEvent {
        data.insert("name".into(), serde_json::Value::String(name.to_string()));
        self.queue.log_event(EventType::Custom, data)
    }

    /// End the session and stop the sync loop. An owned runtime is released
    /// when the context drops. Returns the events emitted while closing the
    /// session.
    pub fn shutdown(mut self) -> Vec<TelemetryEvent> {
        let emitted = self.lifecycle.shutdown();
        self.engine.stop();
        tracing::info!("pulsekit context shut down");
        emitted
    }
}

impl Drop for SdkContext {
    fn drop(&mut self) {
        // Blocking shutdown panics inside async code.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::SessionState;
    use crate::sync::{RecordingScheduler, SkipReason, SyncOutcome};
    use tempfile::TempDir;
    use tokio::runtime::RuntimeFlavor;

    const T0: i64 = 1_740_823_200_000;

    fn builder(dir: &TempDir, clock: Arc<ManualClock>) -> SdkBuilder {
        SdkContext::builder()
            .data_dir(dir.path())
            .clock(clock)
            .start_sync(false)
    }

    #[test]
    fn test_build_creates_state_files() {
        let dir = TempDir::new().unwrap();
        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .build()
            .unwrap();

        assert!(dir.path().join(PREFS_FILE).exists());
        assert!(Config::path_in(dir.path()).exists());
        let hash = ctx.identity().device_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(ctx.prefs().device_hash().unwrap().as_deref(), Some(hash.as_str()));
        ctx.shutdown();
    }

    #[test]
    fn test_identity_from_config_persists_tester_id() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.identity.tester_id = "tester-9".into();
        config.identity.campaign_id = "camp-9".into();

        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .config(config)
            .build()
            .unwrap();
        assert_eq!(ctx.identity().tester_id(), "tester-9");
        assert!(ctx.identity().is_complete());
        ctx.shutdown();

        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .build()
            .unwrap();
        assert_eq!(ctx.identity().tester_id(), "tester-9");
        ctx.shutdown();
    }

    #[test]
    fn test_session_survives_restart() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(T0));

        let mut ctx = builder(&dir, clock.clone()).build().unwrap();
        assert!(ctx.lifecycle().on_foreground().is_some());
        // Process dies without shutdown.
        drop(ctx);

        clock.advance_secs(42);
        let mut ctx = builder(&dir, clock.clone()).build().unwrap();
        assert_eq!(ctx.lifecycle().tracker().state(), SessionState::Active);
        assert_eq!(ctx.lifecycle().tracker().current_session_duration(), 42);
        assert!(ctx.lifecycle().on_foreground().is_none());
        assert_eq!(ctx.queue().len(), 1);
        ctx.shutdown();
    }

    #[test]
    fn test_log_custom_event_names_payload() {
        let dir = TempDir::new().unwrap();
        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .build()
            .unwrap();

        let mut data = serde_json::Map::new();
        data.insert("screen".into(), serde_json::json!("settings"));
        let event = ctx.log_custom_event("opened_settings", data);

        assert_eq!(event.event_type, EventType::Custom);
        assert_eq!(event.data["name"], "opened_settings");
        assert_eq!(event.data["screen"], "settings");
        assert_eq!(ctx.queue().len(), 1);
        ctx.shutdown();
    }

    #[test]
    fn test_campaign_and_tracking_prefs() {
        let dir = TempDir::new().unwrap();
        let mut ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .build()
            .unwrap();

        ctx.set_campaign_start(T0 - 1_000).unwrap();
        assert_eq!(ctx.prefs().campaign_start_ms().unwrap(), T0 - 1_000);

        ctx.set_tracking_enabled(false).unwrap();
        assert!(ctx.lifecycle().on_foreground().is_none());
        assert!(ctx.queue().is_empty());
        ctx.shutdown();
    }

    #[test]
    fn test_sync_without_endpoint_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let scheduler = Arc::new(RecordingScheduler::default());
        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .scheduler(scheduler.clone())
            .start_sync(true)
            .build()
            .unwrap();
        ctx.log_custom_event("x", serde_json::Map::new());

        let outcome = ctx.runtime().block_on(ctx.sync().sync_now());
        assert_eq!(outcome, SyncOutcome::skipped(SkipReason::NotConfigured));
        assert_eq!(ctx.queue().len(), 1);
        assert_eq!(scheduler.scheduled(), 1);

        ctx.shutdown();
        assert_eq!(scheduler.cancelled(), 1);
    }

    #[test]
    fn test_host_identity_still_persists_device_hash() {
        let dir = TempDir::new().unwrap();
        let identity = SharedIdentity::new(Identity {
            tester_id: "host-tester".into(),
            device_hash: None,
            campaign_id: "camp-1".into(),
            package_name: "com.example.app".into(),
        });
        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .identity(Arc::new(identity))
            .build()
            .unwrap();

        assert_eq!(ctx.identity().tester_id(), "host-tester");
        let stored = ctx.prefs().device_hash().unwrap().unwrap();
        assert_eq!(stored.len(), 64);
        ctx.shutdown();

        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .build()
            .unwrap();
        assert_eq!(ctx.identity().device_hash().as_deref(), Some(stored.as_str()));
        ctx.shutdown();
    }

    #[tokio::test]
    async fn test_context_inside_async_host() {
        let dir = TempDir::new().unwrap();
        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .start_sync(true)
            .build()
            .unwrap();
        assert_eq!(ctx.runtime().runtime_flavor(), RuntimeFlavor::CurrentThread);
        assert!(ctx.sync().is_running());

        ctx.log_custom_event("x", serde_json::Map::new());
        let outcome = ctx.sync().sync_now().await;
        assert_eq!(outcome, SyncOutcome::skipped(SkipReason::NotConfigured));
        ctx.shutdown();

        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .start_sync(true)
            .build()
            .unwrap();
        drop(ctx);
    }

    #[test]
    fn test_owned_runtime_dropped_from_async_code() {
        let dir = TempDir::new().unwrap();
        let ctx = builder(&dir, Arc::new(ManualClock::new(T0)))
            .start_sync(true)
            .build()
            .unwrap();
        assert_eq!(ctx.runtime().runtime_flavor(), RuntimeFlavor::MultiThread);

        let host = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        host.block_on(async move {
            ctx.shutdown();
        });
    }

    #[test]
    fn test_shutdown_closes_active_session() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        let mut ctx = builder(&dir, clock.clone()).build().unwrap();

        ctx.lifecycle().on_foreground();
        clock.advance_secs(30);
        let emitted = ctx.shutdown();

        let types: Vec<_> = emitted.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::AppClose, EventType::SessionDuration]);
        let prefs = PrefsStore::open(&dir.path().join(PREFS_FILE)).unwrap();
        assert_eq!(prefs.session_start_ms().unwrap(), None);
    }
}
