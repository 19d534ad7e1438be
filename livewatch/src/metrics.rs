//! Monitor-wide counters.
//!
//! Every counter is a relaxed atomic. Readers only ever see an approximate
//! view, which is fine for status reports and the stats endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use serde::Serialize;

/// Counters shared by the reconciler, listener tasks and engagement tasks.
pub struct MonitorMetrics {
    start_time: Instant,
    /// Reconciliation ticks started.
    ticks: AtomicU64,
    /// Room list polls that failed.
    poll_failures: AtomicU64,
    /// Listeners successfully acquired.
    acquired: AtomicU64,
    /// Listeners released because their room went away.
    released: AtomicU64,
    /// Connect attempts that failed.
    acquire_failures: AtomicU64,
    /// Dead listeners removed after their subscription ended.
    reaped: AtomicU64,
    /// Events handed to the dispatcher.
    events_dispatched: AtomicU64,
    likes_sent: AtomicU64,
    like_failures: AtomicU64,
}

/// Point-in-time copy of [`MonitorMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub ticks: u64,
    pub poll_failures: u64,
    pub acquired: u64,
    pub released: u64,
    pub acquire_failures: u64,
    pub reaped: u64,
    pub events_dispatched: u64,
    pub likes_sent: u64,
    pub like_failures: u64,
}

impl MonitorMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_failure(&self) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquire_failure(&self) {
        self.acquire_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reaped(&self) {
        self.reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_like(&self) {
        self.likes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_like_failure(&self) {
        self.like_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the monitor started.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn likes_sent(&self) -> u64 {
        self.likes_sent.load(Ordering::Relaxed)
    }

    pub fn like_failures(&self) -> u64 {
        self.like_failures.load(Ordering::Relaxed)
    }

    pub fn events_dispatched(&self) -> u64 {
        self.events_dispatched.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            ticks: self.ticks.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            acquire_failures: self.acquire_failures.load(Ordering::Relaxed),
            reaped: self.reaped.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched(),
            likes_sent: self.likes_sent(),
            like_failures: self.like_failures(),
        }
    }

    /// Log a one-line summary.
    pub fn print_report(&self) {
        let s = self.snapshot();
        info!(
            "[Monitor] Metrics: uptime={}s, ticks={} (poll failures={}), acquired={}, \
             released={}, reaped={}, connect failures={}, events={}, likes={} (failed={})",
            s.uptime_secs,
            s.ticks,
            s.poll_failures,
            s.acquired,
            s.released,
            s.reaped,
            s.acquire_failures,
            s.events_dispatched,
            s.likes_sent,
            s.like_failures
        );
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        MonitorMetrics {
            start_time: Instant::now(),
            ticks: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            acquire_failures: AtomicU64::new(0),
            reaped: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            likes_sent: AtomicU64::new(0),
            like_failures: AtomicU64::new(0),
        }
    }
}
