//! Listener lifecycle management.
//!
//! [`LiveMonitor`] is the only component that changes registry membership.
//! Listener tasks report their exit on a completion channel and the monitor
//! reaps them on the next reconciliation tick.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use livewatch_protocol::{
    ActionClient, ApiError, LiveConnector, OwnerId, RoomDescriptor, Session, StreamDescriptor,
};

use crate::engage::EngagementTask;
use crate::filter::FilterSet;
use crate::listener::{EventDispatcher, ExitReason, ListenerExit, ListenerTask};
use crate::metrics::MonitorMetrics;
use crate::registry::{
    ListenerHandle, ListenerInfo, ListenerRegistry, ListenerStatus, Registries, StreamRegistry,
};

/// Monitor errors.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to connect to room {owner_id}: {source}")]
    Connect {
        owner_id: OwnerId,
        #[source]
        source: ApiError,
    },

    #[error("No active listener for room {0}")]
    UnknownRoom(OwnerId),

    #[error("Action failed: {0}")]
    Action(#[from] ApiError),

    #[error("Monitor is stopped")]
    Stopped,
}

/// Engagement settings applied to every acquired room.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Start an [`EngagementTask`] per room.
    pub auto_engage: bool,
    /// Interval between likes.
    pub engage_interval: Duration,
}

/// Owns the room listeners and the registries describing them.
pub struct LiveMonitor {
    session: Arc<Session>,
    connector: Arc<dyn LiveConnector>,
    actions: Arc<dyn ActionClient>,
    dispatcher: Arc<EventDispatcher>,
    registries: Registries,
    settings: MonitorSettings,
    metrics: Arc<MonitorMetrics>,
    /// Parent of every room token.
    root: CancellationToken,
    exit_tx: mpsc::UnboundedSender<ListenerExit>,
    exit_rx: Mutex<mpsc::UnboundedReceiver<ListenerExit>>,
}

impl LiveMonitor {
    pub fn new(
        session: Arc<Session>,
        connector: Arc<dyn LiveConnector>,
        actions: Arc<dyn ActionClient>,
        dispatcher: EventDispatcher,
        registries: Registries,
        settings: MonitorSettings,
    ) -> Arc<Self> {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            session,
            connector,
            actions,
            dispatcher: Arc::new(dispatcher),
            registries,
            settings,
            metrics: MonitorMetrics::new(),
            root: CancellationToken::new(),
            exit_tx,
            exit_rx: Mutex::new(exit_rx),
        })
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.registries.listeners
    }

    pub fn streams(&self) -> &Arc<StreamRegistry> {
        &self.registries.streams
    }

    pub fn filter(&self) -> &Arc<FilterSet> {
        &self.registries.filter
    }

    pub fn metrics(&self) -> &Arc<MonitorMetrics> {
        &self.metrics
    }

    /// Cancelled once [`LiveMonitor::stop`] is called.
    pub fn root_token(&self) -> &CancellationToken {
        &self.root
    }

    pub fn is_stopped(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Start listening to `room`.
    ///
    /// Returns the existing handle untouched if the room is already
    /// monitored. On connect failure, or if the monitor is stopped before
    /// the listener is registered, nothing is registered.
    pub async fn acquire_listener(
        &self,
        room: &RoomDescriptor,
    ) -> Result<Arc<ListenerHandle>, MonitorError> {
        if let Some(existing) = self.listeners().get(room.owner_id).await {
            debug!("Room {} is already being monitored", room.owner_id);
            return Ok(existing);
        }
        if self.is_stopped() {
            return Err(MonitorError::Stopped);
        }

        info!(
            "Adding listener for {} (UID: {}) - {}",
            room.display_name, room.owner_id, room.title
        );

        let subscription = match self.connector.connect(self.session.clone(), room).await {
            Ok(subscription) => subscription,
            Err(source) => {
                self.metrics.record_acquire_failure();
                return Err(MonitorError::Connect {
                    owner_id: room.owner_id,
                    source,
                });
            }
        };

        // Born cancelled when stop() ran during the connect.
        let token = self.root.child_token();
        if token.is_cancelled() {
            return Err(MonitorError::Stopped);
        }
        let handle = Arc::new(ListenerHandle::new(
            room,
            subscription.live_id,
            self.listeners().next_generation(),
            token.clone(),
        ));

        if let Err(existing) = self.listeners().insert(handle.clone()).await {
            // Lost a race against another acquire for the same room.
            token.cancel();
            return Ok(existing);
        }
        self.streams()
            .insert(StreamDescriptor::new(room.owner_id, subscription.variants))
            .await;

        // stop() cancels before it drains, so a cancelled token here means
        // the drain may already have missed these entries.
        if token.is_cancelled() {
            self.listeners()
                .remove_generation(room.owner_id, handle.generation())
                .await;
            self.streams().remove(room.owner_id).await;
            return Err(MonitorError::Stopped);
        }

        ListenerTask::new(
            handle.clone(),
            subscription.events,
            self.dispatcher.clone(),
            self.exit_tx.clone(),
            self.metrics.clone(),
        )
        .spawn();

        if self.settings.auto_engage {
            EngagementTask::new(
                &handle,
                self.actions.clone(),
                self.session.clone(),
                self.settings.engage_interval,
                self.metrics.clone(),
            )
            .spawn();
        }

        self.metrics.record_acquired();
        Ok(handle)
    }

    /// Stop listening to `owner_id`. Returns `false` if it was not
    /// monitored.
    pub async fn release_listener(&self, owner_id: OwnerId) -> bool {
        let Some(handle) = self.listeners().remove(owner_id).await else {
            debug!("Room {} is not monitored, nothing to release", owner_id);
            return false;
        };

        handle.set_status(ListenerStatus::Stopping);
        handle.cancel();
        self.streams().remove(owner_id).await;
        self.metrics.record_released();

        info!(
            "Removed listener for {} (UID: {})",
            handle.display_name, owner_id
        );
        true
    }

    /// Remove listeners whose task exited on its own. Returns how many
    /// handles were removed.
    ///
    /// Exit notices for handles that were already released or replaced are
    /// ignored.
    pub async fn reap_exited(&self) -> usize {
        let mut exits = Vec::new();
        {
            let mut rx = self.exit_rx.lock().await;
            while let Ok(exit) = rx.try_recv() {
                exits.push(exit);
            }
        }

        let mut reaped = 0;
        for exit in exits {
            if exit.reason == ExitReason::Cancelled {
                continue;
            }
            if let Some(handle) = self
                .listeners()
                .remove_generation(exit.owner_id, exit.generation)
                .await
            {
                // Stops the engagement task bound to the same token.
                handle.cancel();
                self.streams().remove(exit.owner_id).await;
                self.metrics.record_reaped();
                warn!(
                    "Reaped dead listener for {} (UID: {}): {}",
                    handle.display_name, exit.owner_id, exit.reason
                );
                reaped += 1;
            }
        }
        reaped
    }

    /// Cancel every room and clear both registries.
    pub async fn stop(&self) {
        info!("Stopping live monitor...");
        self.root.cancel();

        let handles = self.listeners().drain().await;
        for handle in &handles {
            handle.set_status(ListenerStatus::Stopping);
            handle.cancel();
        }
        self.streams().clear().await;

        info!("Live monitor stopped, released {} listeners", handles.len());
    }

    pub async fn active_listener_count(&self) -> usize {
        self.listeners().count().await
    }

    pub async fn listener_statuses(&self) -> Vec<ListenerInfo> {
        self.listeners().snapshot().await
    }

    /// Post a comment to the live currently monitored for `owner_id`.
    pub async fn send_comment_to_room(
        &self,
        owner_id: OwnerId,
        content: &str,
    ) -> Result<(), MonitorError> {
        let handle = self
            .listeners()
            .get(owner_id)
            .await
            .ok_or(MonitorError::UnknownRoom(owner_id))?;
        self.actions
            .send_comment(&self.session, &handle.live_id, content)
            .await?;
        Ok(())
    }

    /// Send a gift to the live currently monitored for `owner_id`.
    pub async fn send_gift_to_room(
        &self,
        owner_id: OwnerId,
        gift_id: u32,
        batch_size: u32,
    ) -> Result<(), MonitorError> {
        let handle = self
            .listeners()
            .get(owner_id)
            .await
            .ok_or(MonitorError::UnknownRoom(owner_id))?;
        self.actions
            .send_gift(&self.session, &handle.live_id, gift_id, batch_size, None)
            .await?;
        Ok(())
    }
}
