//! Per-room listener task.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use livewatch_protocol::{EventStream, OwnerId};

use super::dispatch::EventDispatcher;
use crate::metrics::MonitorMetrics;
use crate::registry::{ListenerHandle, ListenerStatus};

/// Why a listener task exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The handle's token was cancelled (release or shutdown).
    Cancelled,
    /// The event stream ended.
    Ended,
    /// The event stream yielded an error.
    Failed(String),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Cancelled => write!(f, "cancelled"),
            ExitReason::Ended => write!(f, "stream ended"),
            ExitReason::Failed(e) => write!(f, "stream failed: {}", e),
        }
    }
}

/// Completion notice sent when a listener task exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerExit {
    pub owner_id: OwnerId,
    pub generation: u64,
    pub reason: ExitReason,
}

/// Consumes one room's event stream until cancelled or the stream ends.
///
/// The task never touches registry membership; it reports its exit on the
/// completion channel and lets the monitor clean up.
pub struct ListenerTask {
    handle: Arc<ListenerHandle>,
    events: EventStream,
    dispatcher: Arc<EventDispatcher>,
    exit_tx: mpsc::UnboundedSender<ListenerExit>,
    metrics: Arc<MonitorMetrics>,
}

impl ListenerTask {
    pub fn new(
        handle: Arc<ListenerHandle>,
        events: EventStream,
        dispatcher: Arc<EventDispatcher>,
        exit_tx: mpsc::UnboundedSender<ListenerExit>,
        metrics: Arc<MonitorMetrics>,
    ) -> Self {
        Self {
            handle,
            events,
            dispatcher,
            exit_tx,
            metrics,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let owner_id = self.handle.owner_id;
        if self.handle.mark_active() {
            debug!("Listener for room {} is active", owner_id);
        }

        let token = self.handle.token().clone();
        let reason = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break ExitReason::Cancelled,
                next = self.events.next() => match next {
                    Some(Ok(event)) => {
                        self.handle.touch();
                        self.dispatcher.dispatch(&self.handle, &event);
                        self.metrics.record_event();
                    }
                    Some(Err(e)) => break ExitReason::Failed(e.to_string()),
                    None => break ExitReason::Ended,
                },
            }
        };

        self.handle.set_status(ListenerStatus::Stopped);
        match &reason {
            ExitReason::Cancelled => info!("Listener for room {} stopped", owner_id),
            other => warn!("Listener for room {} exited: {}", owner_id, other),
        }

        // The receiver is gone only after the monitor itself was dropped.
        let _ = self.exit_tx.send(ListenerExit {
            owner_id,
            generation: self.handle.generation(),
            reason,
        });
    }
}
