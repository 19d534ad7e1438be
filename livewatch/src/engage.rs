//! Periodic like per monitored room.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use livewatch_protocol::{ActionClient, OwnerId, Session};

use crate::metrics::MonitorMetrics;
use crate::registry::ListenerHandle;

/// Likes sent per action.
pub const LIKE_COUNT: u32 = 1;
/// Like animation duration in milliseconds.
pub const LIKE_DURATION_MS: u32 = 800;

/// Sends a like right away and then every `interval`, until the room's
/// listener token is cancelled.
pub struct EngagementTask {
    actions: Arc<dyn ActionClient>,
    session: Arc<Session>,
    owner_id: OwnerId,
    live_id: String,
    display_name: String,
    interval: Duration,
    token: CancellationToken,
    metrics: Arc<MonitorMetrics>,
}

impl EngagementTask {
    /// Bind a task to `handle`, sharing its cancellation token.
    pub fn new(
        handle: &ListenerHandle,
        actions: Arc<dyn ActionClient>,
        session: Arc<Session>,
        interval: Duration,
        metrics: Arc<MonitorMetrics>,
    ) -> Self {
        Self {
            actions,
            session,
            owner_id: handle.owner_id,
            live_id: handle.live_id.clone(),
            display_name: handle.display_name.clone(),
            interval,
            token: handle.token().clone(),
            metrics,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(
            "Starting auto like for {} (UID: {}) every {}s",
            self.display_name,
            self.owner_id,
            self.interval.as_secs()
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    info!("Stopping auto like for {} (UID: {})", self.display_name, self.owner_id);
                    break;
                }
                _ = ticker.tick() => self.fire().await,
            }
        }
    }

    async fn fire(&self) {
        match self
            .actions
            .send_like(&self.session, &self.live_id, LIKE_COUNT, LIKE_DURATION_MS)
            .await
        {
            Ok(()) => {
                self.metrics.record_like();
                debug!("Sent like to {} (UID: {})", self.display_name, self.owner_id);
            }
            Err(e) => {
                self.metrics.record_like_failure();
                warn!(
                    "Failed to send like to {} (UID: {}): {}",
                    self.display_name, self.owner_id, e
                );
            }
        }
    }
}
