//! Periodic status output.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::monitor::LiveMonitor;

/// Logs the active listener count every `interval`, per-room detail at
/// debug level.
pub struct StatusReporter {
    monitor: Arc<LiveMonitor>,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(monitor: Arc<LiveMonitor>, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let token = self.monitor.root_token().clone();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.report().await;
                }
            }
        }
    }

    /// Log the current status once and return the listener count.
    pub async fn report(&self) -> usize {
        let statuses = self.monitor.listener_statuses().await;
        info!("Currently listening to {} rooms", statuses.len());

        for status in &statuses {
            let last_event = status
                .last_event_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string());
            debug!(
                "{} - {} (last event {}, {:?})",
                status.display_name, status.title, last_event, status.status
            );
        }

        self.monitor.metrics().print_report();
        statuses.len()
    }
}
