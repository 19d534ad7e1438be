//! Collaborator interfaces consumed by the monitor.
//!
//! The monitor never talks to the platform directly; it goes through these
//! traits so the HTTP implementations and the test fakes are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ApiError;
use crate::types::{LiveEvent, RoomDescriptor, Session, StreamVariant};

/// Stream of events for one room. Ends when the room stops or the
/// subscription fails; a yielded error is terminal.
pub type EventStream = BoxStream<'static, Result<LiveEvent, ApiError>>;

/// Source of the current live room list.
#[async_trait]
pub trait RoomSource: Send + Sync {
    /// Fetch every room that is live right now.
    async fn live_rooms(&self) -> Result<Vec<RoomDescriptor>, ApiError>;
}

/// An established subscription to one room.
pub struct LiveSubscription {
    /// Live id the subscription is bound to.
    pub live_id: String,
    /// Stream renditions advertised when the subscription was opened.
    pub variants: Vec<StreamVariant>,
    /// Inbound events, in arrival order.
    pub events: EventStream,
}

impl std::fmt::Debug for LiveSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSubscription")
            .field("live_id", &self.live_id)
            .field("variants", &self.variants)
            .finish_non_exhaustive()
    }
}

/// Opens per-room event subscriptions.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Start listening to `room` with the shared session.
    async fn connect(
        &self,
        session: Arc<Session>,
        room: &RoomDescriptor,
    ) -> Result<LiveSubscription, ApiError>;
}

/// Stateless engagement actions. Each call issues exactly one request and
/// never retries.
#[async_trait]
pub trait ActionClient: Send + Sync {
    /// Send `count` likes with the given animation duration.
    async fn send_like(
        &self,
        session: &Session,
        live_id: &str,
        count: u32,
        duration_ms: u32,
    ) -> Result<(), ApiError>;

    /// Post a comment.
    async fn send_comment(
        &self,
        session: &Session,
        live_id: &str,
        content: &str,
    ) -> Result<(), ApiError>;

    /// Send a gift. A combo key is generated when `combo_key` is `None`.
    async fn send_gift(
        &self,
        session: &Session,
        live_id: &str,
        gift_id: u32,
        batch_size: u32,
        combo_key: Option<&str>,
    ) -> Result<(), ApiError>;
}
