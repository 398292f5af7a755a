//! Tests for the sync engine.

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::clock::ManualClock;
    use crate::events::{EventType, RemoteDocument};
    use crate::queue::{EventQueue, EventStamper};
    use crate::signals::{EmptyFraudFlags, Identity, SharedIdentity};
    use crate::storage::SyncConfig;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tokio::sync::Notify;

    const T0: i64 = 1_740_823_200_000;

    /// Remote store that fails events whose `data.i` is in `fail`.
    #[derive(Default)]
    struct MockRemote {
        fail: HashSet<u64>,
        received: Mutex<Vec<RemoteDocument>>,
        collections: Mutex<Vec<String>>,
        unconfigured: bool,
        block_first: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl MockRemote {
        fn failing(ids: &[u64]) -> Self {
            Self {
                fail: ids.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn received_indexes(&self) -> Vec<u64> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .map(|d| d.event_data["i"].as_u64().unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemote {
        async fn create_document(
            &self,
            collection: &str,
            document: &RemoteDocument,
        ) -> Result<(), SyncError> {
            if self.block_first.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.collections.lock().unwrap().push(collection.to_string());
            let i = document.event_data["i"].as_u64().unwrap_or(u64::MAX);
            if self.fail.contains(&i) {
                return Err(SyncError::Remote {
                    status: 500,
                    message: "boom".into(),
                });
            }
            self.received.lock().unwrap().push(document.clone());
            Ok(())
        }

        fn is_configured(&self) -> bool {
            !self.unconfigured
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        queue: Arc<EventQueue>,
        remote: Arc<MockRemote>,
        identity: SharedIdentity,
        connectivity: ConnectivityFlag,
        scheduler: Arc<RecordingScheduler>,
    }

    impl Harness {
        fn new(remote: MockRemote) -> Self {
            let clock = Arc::new(ManualClock::new(T0));
            let identity = SharedIdentity::new(Identity {
                tester_id: "tester-1".into(),
                device_hash: Some("hash".into()),
                campaign_id: "camp-1".into(),
                package_name: "com.example.app".into(),
            });
            let stamper = EventStamper {
                identity: Arc::new(identity.clone()),
                fraud_flags: Arc::new(EmptyFraudFlags),
                clock: clock.clone(),
            };
            Self {
                queue: Arc::new(EventQueue::in_memory(1000, stamper)),
                remote: Arc::new(remote),
                identity,
                connectivity: ConnectivityFlag::default(),
                scheduler: Arc::new(RecordingScheduler::default()),
                clock,
            }
        }

        fn engine(&self) -> SyncEngine {
            self.engine_with(SyncConfig::default())
        }

        fn engine_with(&self, config: SyncConfig) -> SyncEngine {
            SyncEngine::new(
                SyncDeps {
                    queue: self.queue.clone(),
                    remote: self.remote.clone(),
                    connectivity: Arc::new(self.connectivity.clone()),
                    identity: Arc::new(self.identity.clone()),
                    scheduler: self.scheduler.clone(),
                    clock: self.clock.clone(),
                },
                config,
                Handle::current(),
            )
        }

        fn log(&self, count: u64) -> Vec<String> {
            (0..count)
                .map(|i| {
                    let mut data = serde_json::Map::new();
                    data.insert("i".into(), serde_json::json!(i));
                    self.queue.log_event(EventType::Custom, data).id
                })
                .collect()
        }

        fn queued_indexes(&self) -> Vec<u64> {
            self.queue
                .pending_events(None)
                .iter()
                .map(|e| e.data["i"].as_u64().unwrap())
                .collect()
        }
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_only_failed_events() {
        let h = Harness::new(MockRemote::failing(&[1, 3]));
        h.log(5);
        let engine = h.engine();

        let outcome = engine.sync_now().await;

        let report = outcome.report().expect("pass should run");
        assert_eq!(report.attempted, 5);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.removed, 3);
        assert_eq!(h.queued_indexes(), vec![1, 3]);
        assert_eq!(h.remote.received_indexes(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_uploads_go_to_configured_collection() {
        let h = Harness::new(MockRemote::default());
        h.log(2);
        let engine = h.engine_with(SyncConfig {
            collection: "tester_events".into(),
            ..SyncConfig::default()
        });

        engine.sync_now().await;

        let collections = h.remote.collections.lock().unwrap().clone();
        assert_eq!(collections, vec!["tester_events", "tester_events"]);
        let doc = &h.remote.received.lock().unwrap()[0];
        assert_eq!(doc.tester_id, "tester-1");
        assert_eq!(doc.campaign_id, "camp-1");
    }

    #[tokio::test]
    async fn test_batch_limit_takes_oldest_first() {
        let h = Harness::new(MockRemote::default());
        h.log(7);
        let engine = h.engine_with(SyncConfig {
            max_events_per_batch: 3,
            ..SyncConfig::default()
        });

        let report = engine.sync_now().await.report().unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(h.remote.received_indexes(), vec![0, 1, 2]);
        assert_eq!(h.queued_indexes(), vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_empty_queue_completes_without_uploads() {
        let h = Harness::new(MockRemote::default());
        let engine = h.engine();

        let report = engine.sync_now().await.report().unwrap();
        assert_eq!(report, PassReport::default());
        assert!(h.remote.received_indexes().is_empty());
        assert!(engine.status().last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_debounce_window() {
        let h = Harness::new(MockRemote::default());
        h.log(1);
        let engine = h.engine();

        assert!(engine.sync_now().await.report().is_some());
        h.log(1);
        h.clock.advance_ms(4_999);
        assert_eq!(
            engine.sync_now().await,
            SyncOutcome::skipped(SkipReason::Debounced)
        );
        assert_eq!(h.queue.len(), 1);

        h.clock.advance_ms(1);
        assert!(engine.sync_now().await.report().is_some());
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_offline_skips_and_keeps_queue() {
        let h = Harness::new(MockRemote::default());
        h.log(2);
        h.connectivity.set_online(false);
        let engine = h.engine();

        assert_eq!(
            engine.sync_now().await,
            SyncOutcome::skipped(SkipReason::Offline)
        );
        assert_eq!(h.queue.len(), 2);
        assert!(engine.status().last_pass.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_identity_skips() {
        let h = Harness::new(MockRemote::default());
        h.log(1);
        h.identity.update(|id| id.campaign_id.clear());
        let engine = h.engine();

        assert_eq!(
            engine.sync_now().await,
            SyncOutcome::skipped(SkipReason::NotConfigured)
        );
        assert_eq!(h.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_remote_skips() {
        let h = Harness::new(MockRemote {
            unconfigured: true,
            ..MockRemote::default()
        });
        h.log(1);
        let engine = h.engine();

        assert_eq!(
            engine.sync_now().await,
            SyncOutcome::skipped(SkipReason::NotConfigured)
        );
    }

    #[tokio::test]
    async fn test_concurrent_pass_is_skipped() {
        let remote = MockRemote::default();
        remote.block_first.store(true, Ordering::SeqCst);
        let h = Harness::new(remote);
        h.log(2);
        let engine = Arc::new(h.engine());

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_pass().await })
        };
        h.remote.entered.notified().await;

        assert!(engine.status().in_progress);
        assert_eq!(
            engine.run_pass().await,
            SyncOutcome::skipped(SkipReason::AlreadyRunning)
        );

        h.remote.release.notify_one();
        let report = first.await.unwrap().report().unwrap();
        assert_eq!(report.succeeded, 2);
        assert!(!engine.status().in_progress);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_live_pending_count() {
        let h = Harness::new(MockRemote::failing(&[0]));
        h.log(3);
        let engine = h.engine();
        assert_eq!(engine.status().pending_count, 3);

        engine.sync_now().await;
        let status = engine.status();
        assert_eq!(status.pending_count, 1);
        assert_eq!(status.last_pass.unwrap().failed, 1);
        assert!(!status.in_progress);
    }

    #[tokio::test]
    async fn test_failures_feed_retry_tracker() {
        let h = Harness::new(MockRemote::failing(&[0]));
        let ids = h.log(1);
        let engine = h.engine();

        for _ in 0..4 {
            engine.run_pass().await;
        }

        assert_eq!(engine.attempts_for(&ids[0]), 4);
        assert_eq!(h.queue.len(), 1, "failing events are never dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_loop_drains_queue() {
        let h = Harness::new(MockRemote::default());
        h.log(3);
        let engine = h.engine();

        engine.start();
        engine.start();
        assert!(engine.is_running());
        assert_eq!(h.scheduler.scheduled(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.queue.len(), 3);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(h.queue.is_empty());

        engine.stop();
        assert_eq!(h.scheduler.cancelled(), 1);
        engine.stop();
        assert_eq!(h.scheduler.cancelled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_loop_ignores_debounce() {
        let h = Harness::new(MockRemote::default());
        let engine = h.engine_with(SyncConfig {
            interval_secs: 1,
            ..SyncConfig::default()
        });
        assert!(engine.sync_now().await.report().is_some());
        h.log(1);

        engine.start();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(h.queue.is_empty());
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_pass_keeps_loop_cadence() {
        let remote = MockRemote::default();
        remote.block_first.store(true, Ordering::SeqCst);
        let h = Harness::new(remote);
        h.log(1);
        let engine = h.engine_with(SyncConfig {
            interval_secs: 60,
            ..SyncConfig::default()
        });

        engine.start();
        // First wake at t=60 hangs on the upload.
        h.remote.entered.notified().await;

        let mut data = serde_json::Map::new();
        data.insert("i".into(), serde_json::json!(1));
        h.queue.log_event(EventType::Custom, data);

        // The t=120 wake overlaps the stalled pass and is skipped.
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(h.queued_indexes(), vec![0, 1]);

        h.remote.release.notify_one();
        tokio::time::sleep(Duration::from_secs(35)).await;

        // The t=180 wake stayed on the grid and delivered the second event.
        assert!(h.queue.is_empty());
        assert_eq!(h.remote.received_indexes(), vec![0, 1]);
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_loop_runs_no_more_passes() {
        let h = Harness::new(MockRemote::default());
        let engine = h.engine_with(SyncConfig {
            interval_secs: 1,
            ..SyncConfig::default()
        });

        engine.start();
        engine.stop();
        h.log(1);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.queue.len(), 1);
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_request_sync_runs_in_background() {
        let h = Harness::new(MockRemote::default());
        h.log(2);
        let engine = h.engine();

        engine.request_sync();
        for _ in 0..100 {
            if h.queue.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(h.queue.is_empty());
    }
}
