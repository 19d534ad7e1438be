//! Periodic room-set reconciliation.
//!
//! # How It Works
//!
//! 1. The room source is polled for every live room
//! 2. Exit notices from listener tasks are drained and dead handles reaped
//! 3. Filtered owners are dropped from the result
//! 4. New rooms are acquired, then rooms no longer live are released
//!
//! A failed poll leaves the registries untouched, exit notices included,
//! until the next tick. Each
//! registry mutation is atomic on its own; no lock is held across a tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use livewatch_protocol::{ApiError, OwnerId, RoomDescriptor, RoomSource};

use crate::monitor::LiveMonitor;

/// Reconciler configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between room list polls.
    pub poll_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
        }
    }
}

/// Outcome of one reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Rooms reported live by the source.
    pub live: usize,
    /// Live rooms skipped by the filter.
    pub filtered: usize,
    pub acquired: usize,
    pub released: usize,
    /// Dead listeners removed after a successful poll.
    pub reaped: usize,
    /// Acquire attempts that failed.
    pub failed: usize,
}

/// Drives a [`LiveMonitor`] towards the set of live, unfiltered rooms.
pub struct Reconciler {
    monitor: Arc<LiveMonitor>,
    source: Arc<dyn RoomSource>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        monitor: Arc<LiveMonitor>,
        source: Arc<dyn RoomSource>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            monitor,
            source,
            config,
        }
    }

    /// Start the reconciliation loop. The first tick runs immediately.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(
            "Reconciler: Starting with poll interval {} seconds",
            self.config.poll_interval.as_secs()
        );

        let token = self.monitor.root_token().clone();
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Reconciler: Stopped");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.reconcile_once().await {
                error!("Reconciler: Failed to fetch live list: {}", e);
            }
        }
    }

    /// Run a single reconciliation pass.
    ///
    /// Only a failed poll is returned as an error; per-room failures are
    /// logged and counted in the summary.
    pub async fn reconcile_once(&self) -> Result<TickSummary, ApiError> {
        let metrics = self.monitor.metrics();
        metrics.record_tick();

        let rooms = match self.source.live_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                metrics.record_poll_failure();
                return Err(e);
            }
        };

        let mut summary = TickSummary {
            live: rooms.len(),
            reaped: self.monitor.reap_exited().await,
            ..TickSummary::default()
        };

        let filter = self.monitor.filter();
        let mut desired: HashMap<OwnerId, RoomDescriptor> = HashMap::with_capacity(rooms.len());
        for room in rooms {
            if filter.should_filter(room.owner_id) {
                summary.filtered += 1;
                continue;
            }
            desired.entry(room.owner_id).or_insert(room);
        }

        let current = self.monitor.listeners().owner_ids().await;

        let mut to_acquire: Vec<&RoomDescriptor> = desired
            .values()
            .filter(|room| !current.contains(&room.owner_id))
            .collect();
        to_acquire.sort_by_key(|room| room.owner_id);

        for room in to_acquire {
            match self.monitor.acquire_listener(room).await {
                Ok(_) => summary.acquired += 1,
                Err(e) => {
                    warn!("Reconciler: {}", e);
                    summary.failed += 1;
                }
            }
        }

        let mut to_release: Vec<OwnerId> = current
            .into_iter()
            .filter(|owner_id| !desired.contains_key(owner_id))
            .collect();
        to_release.sort_unstable();

        for owner_id in to_release {
            if self.monitor.release_listener(owner_id).await {
                summary.released += 1;
            }
        }

        if summary.acquired > 0 || summary.released > 0 || summary.reaped > 0 {
            info!(
                "Reconciler: {} live ({} filtered), +{} -{} (reaped {}, failed {}), now listening to {}",
                summary.live,
                summary.filtered,
                summary.acquired,
                summary.released,
                summary.reaped,
                summary.failed,
                self.monitor.active_listener_count().await
            );
        } else {
            debug!(
                "Reconciler: {} live ({} filtered), no changes",
                summary.live, summary.filtered
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::listener::EventDispatcher;
    use crate::registry::ListenerStatus;
    use crate::testutil::{self, FakeActions, FakeConnector, FakeSource};

    struct Harness {
        reconciler: Reconciler,
        monitor: Arc<LiveMonitor>,
        source: Arc<FakeSource>,
        connector: Arc<FakeConnector>,
    }

    fn harness() -> Harness {
        let source = FakeSource::new();
        let connector = FakeConnector::new();
        let monitor = testutil::monitor(connector.clone(), FakeActions::new(), EventDispatcher::new());
        let reconciler = Reconciler::new(monitor.clone(), source.clone(), ReconcilerConfig::default());
        Harness {
            reconciler,
            monitor,
            source,
            connector,
        }
    }

    async fn keys(monitor: &LiveMonitor) -> HashSet<OwnerId> {
        monitor.listeners().owner_ids().await
    }

    #[tokio::test]
    async fn test_scenario_filtered_room_then_rooms_closing() {
        let h = harness();
        h.monitor.filter().add(2);

        h.source.set_live(&[1, 2]);
        let summary = h.reconciler.reconcile_once().await.unwrap();
        assert_eq!(keys(&h.monitor).await, HashSet::from([1]));
        assert_eq!(summary.live, 2);
        assert_eq!(summary.filtered, 1);
        assert_eq!(summary.acquired, 1);
        let generation = h.monitor.listeners().get(1).await.unwrap().generation();

        h.source.set_live(&[1]);
        let summary = h.reconciler.reconcile_once().await.unwrap();
        assert_eq!(keys(&h.monitor).await, HashSet::from([1]));
        assert_eq!(summary.acquired + summary.released, 0);
        assert_eq!(
            h.monitor.listeners().get(1).await.unwrap().generation(),
            generation
        );

        h.source.set_live(&[]);
        let summary = h.reconciler.reconcile_once().await.unwrap();
        assert!(keys(&h.monitor).await.is_empty());
        assert_eq!(summary.released, 1);
        assert_eq!(h.monitor.streams().len().await, 0);
    }

    #[tokio::test]
    async fn test_filtered_owner_is_never_connected() {
        let h = harness();
        h.monitor.filter().add(5);

        for _ in 0..3 {
            h.source.set_live(&[4, 5, 6]);
            h.reconciler.reconcile_once().await.unwrap();
        }

        assert_eq!(h.connector.connects_for(5), 0);
        assert_eq!(h.connector.connects_for(4), 1);
        assert_eq!(h.connector.connects_for(6), 1);
    }

    #[tokio::test]
    async fn test_no_churn_for_rooms_staying_live() {
        let h = harness();
        h.source.set_live(&[1, 2, 3]);
        h.reconciler.reconcile_once().await.unwrap();

        let before: Vec<u64> = h
            .monitor
            .listener_statuses()
            .await
            .iter()
            .map(|info| info.generation)
            .collect();

        h.source.set_live(&[3, 2, 1]);
        h.reconciler.reconcile_once().await.unwrap();

        let after: Vec<u64> = h
            .monitor
            .listener_statuses()
            .await
            .iter()
            .map(|info| info.generation)
            .collect();
        assert_eq!(before, after);
        assert_eq!(h.connector.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_poll_failure_leaves_state_unchanged() {
        let h = harness();
        h.source.set_live(&[1, 2]);
        h.reconciler.reconcile_once().await.unwrap();

        h.source.set_error(ApiError::Transport("timed out".to_string()));
        assert!(h.reconciler.reconcile_once().await.is_err());
        assert_eq!(keys(&h.monitor).await, HashSet::from([1, 2]));
        assert_eq!(h.monitor.streams().len().await, 2);
        assert_eq!(h.monitor.metrics().snapshot().poll_failures, 1);
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_dead_listener_until_next_poll() {
        let h = harness();
        h.source.set_live(&[1, 2]);
        h.reconciler.reconcile_once().await.unwrap();
        let dead = h.monitor.listeners().get(1).await.unwrap();

        assert!(h.connector.break_stream(1));
        assert!(testutil::eventually(|| dead.status() == ListenerStatus::Stopped).await);
        // Give the exit notice time to land on the channel.
        tokio::time::sleep(Duration::from_millis(50)).await;

        h.source.set_error(ApiError::Transport("timed out".to_string()));
        assert!(h.reconciler.reconcile_once().await.is_err());
        assert_eq!(keys(&h.monitor).await, HashSet::from([1, 2]));
        assert_eq!(h.monitor.streams().len().await, 2);
        assert!(!dead.is_cancelled());

        h.source.set_live(&[1, 2]);
        let summary = h.reconciler.reconcile_once().await.unwrap();
        assert_eq!(summary.reaped, 1);
        assert_eq!(summary.acquired, 1);
        assert_ne!(
            h.monitor.listeners().get(1).await.unwrap().generation(),
            dead.generation()
        );
    }

    #[tokio::test]
    async fn test_acquire_failure_does_not_abort_tick() {
        let h = harness();
        h.connector.fail_for(2);
        h.source.set_live(&[1, 2, 3]);

        let summary = h.reconciler.reconcile_once().await.unwrap();
        assert_eq!(summary.acquired, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(keys(&h.monitor).await, HashSet::from([1, 3]));
    }

    #[tokio::test]
    async fn test_duplicate_rooms_in_poll_acquire_once() {
        let h = harness();
        h.source.set_live(&[1, 1, 1]);
        let summary = h.reconciler.reconcile_once().await.unwrap();
        assert_eq!(summary.acquired, 1);
        assert_eq!(h.connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_dead_listener_is_reacquired_next_tick() {
        let h = harness();
        h.source.set_live(&[1, 2]);
        h.reconciler.reconcile_once().await.unwrap();
        let dead = h.monitor.listeners().get(1).await.unwrap();

        assert!(h.connector.break_stream(1));
        assert!(testutil::eventually(|| dead.status() == ListenerStatus::Stopped).await);

        let mut reaped = 0;
        for _ in 0..100 {
            let summary = h.reconciler.reconcile_once().await.unwrap();
            reaped += summary.reaped;
            if reaped > 0 {
                assert_eq!(summary.acquired, 1);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(reaped, 1);

        let fresh = h.monitor.listeners().get(1).await.unwrap();
        assert_ne!(fresh.generation(), dead.generation());
        assert_eq!(h.connector.connects_for(1), 2);
        assert_eq!(h.connector.connects_for(2), 1);
    }

    #[tokio::test]
    async fn test_newly_filtered_room_released_on_next_tick() {
        let h = harness();
        h.source.set_live(&[1, 2]);
        h.reconciler.reconcile_once().await.unwrap();

        h.monitor.filter().add(2);
        assert!(h.monitor.listeners().contains(2).await);

        h.reconciler.reconcile_once().await.unwrap();
        assert_eq!(keys(&h.monitor).await, HashSet::from([1]));
    }

    #[tokio::test]
    async fn test_convergence_over_poll_sequences() {
        let h = harness();

        // Deterministic pseudo-random sequences of live sets and filters.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..40 {
            let live: Vec<OwnerId> = (1..=8).filter(|_| next() % 2 == 0).collect();
            let filtered: HashSet<OwnerId> = (1..=8).filter(|_| next() % 5 == 0).collect();
            h.monitor.filter().replace(filtered.clone());
            h.source.set_live(&live);

            h.reconciler.reconcile_once().await.unwrap();

            let expected: HashSet<OwnerId> = live
                .iter()
                .copied()
                .filter(|id| !filtered.contains(id))
                .collect();
            assert_eq!(keys(&h.monitor).await, expected);
            let streams: HashSet<OwnerId> =
                h.monitor.streams().owner_ids().await.into_iter().collect();
            assert_eq!(streams, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_polls_on_interval_and_stops_with_monitor() {
        let source = FakeSource::new();
        source.set_live(&[1]);
        let monitor = testutil::monitor(FakeConnector::new(), FakeActions::new(), EventDispatcher::new());
        let reconciler = Arc::new(Reconciler::new(
            monitor.clone(),
            source.clone(),
            ReconcilerConfig {
                poll_interval: Duration::from_secs(60),
            },
        ));

        let task = reconciler.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.polls(), 1);
        assert!(monitor.listeners().contains(1).await);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.polls(), 3);

        monitor.stop().await;
        task.await.unwrap();
        assert_eq!(monitor.active_listener_count().await, 0);
    }
}
