//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Notify;

use livewatch_protocol::{
    ActionClient, ApiError, LiveConnector, LiveEvent, LiveSubscription, OwnerId, RoomDescriptor,
    RoomSource, Session, StreamVariant,
};

use crate::listener::EventDispatcher;
use crate::monitor::{LiveMonitor, MonitorSettings};
use crate::registry::Registries;

pub fn session() -> Arc<Session> {
    Arc::new(Session {
        device_id: "web_test".to_string(),
        user_id: 1000,
        service_token: "st".to_string(),
        security_key: "sk".to_string(),
        cookies: Vec::new(),
    })
}

pub fn room(owner_id: OwnerId) -> RoomDescriptor {
    let mut room = RoomDescriptor::new(owner_id, format!("live-{}", owner_id));
    room.display_name = format!("owner{}", owner_id);
    room.title = format!("title{}", owner_id);
    room
}

pub fn rooms(owner_ids: &[OwnerId]) -> Vec<RoomDescriptor> {
    owner_ids.iter().copied().map(room).collect()
}

/// Room source returning whatever was last scripted.
#[derive(Default)]
pub struct FakeSource {
    next: Mutex<Option<Result<Vec<RoomDescriptor>, ApiError>>>,
    polls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: Mutex::new(Some(Ok(Vec::new()))),
            polls: AtomicUsize::new(0),
        })
    }

    pub fn set_live(&self, owner_ids: &[OwnerId]) {
        *self.next.lock() = Some(Ok(rooms(owner_ids)));
    }

    pub fn set_error(&self, error: ApiError) {
        *self.next.lock() = Some(Err(error));
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomSource for FakeSource {
    async fn live_rooms(&self) -> Result<Vec<RoomDescriptor>, ApiError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.next.lock().clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

type EventSender = mpsc::UnboundedSender<Result<LiveEvent, ApiError>>;

/// Connector handing out channel-backed event streams.
pub struct FakeConnector {
    senders: Mutex<HashMap<OwnerId, EventSender>>,
    connects: Mutex<Vec<OwnerId>>,
    failing: Mutex<HashSet<OwnerId>>,
    gate: Mutex<Option<Arc<Notify>>>,
    variants: Vec<StreamVariant>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            senders: Mutex::new(HashMap::new()),
            connects: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            gate: Mutex::new(None),
            variants: vec![
                StreamVariant::new(500, "https://pull/mid.flv"),
                StreamVariant::new(200, "https://pull/low.flv"),
                StreamVariant::new(800, "https://pull/high.flv"),
            ],
        })
    }

    /// Make every future connect to `owner_id` fail.
    pub fn fail_for(&self, owner_id: OwnerId) {
        self.failing.lock().insert(owner_id);
    }

    /// Hold every future connect until the returned gate is notified.
    pub fn hold_connects(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    pub fn connects_for(&self, owner_id: OwnerId) -> usize {
        self.connects.lock().iter().filter(|id| **id == owner_id).count()
    }

    /// Deliver an event to the most recent subscription of `owner_id`.
    pub fn push(&self, owner_id: OwnerId, event: LiveEvent) -> bool {
        self.senders
            .lock()
            .get(&owner_id)
            .map(|tx| tx.unbounded_send(Ok(event)).is_ok())
            .unwrap_or(false)
    }

    /// Terminate the subscription of `owner_id` with an error.
    pub fn break_stream(&self, owner_id: OwnerId) -> bool {
        self.senders
            .lock()
            .remove(&owner_id)
            .map(|tx| {
                tx.unbounded_send(Err(ApiError::Transport("connection reset".to_string())))
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl LiveConnector for FakeConnector {
    async fn connect(
        &self,
        _session: Arc<Session>,
        room: &RoomDescriptor,
    ) -> Result<LiveSubscription, ApiError> {
        self.connects.lock().push(room.owner_id);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.lock().contains(&room.owner_id) {
            return Err(ApiError::Rejected {
                code: 380023,
                message: "live ended".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded();
        self.senders.lock().insert(room.owner_id, tx);
        Ok(LiveSubscription {
            live_id: room.live_id.clone(),
            variants: self.variants.clone(),
            events: rx.boxed(),
        })
    }
}

/// Action client recording every call.
#[derive(Default)]
pub struct FakeActions {
    likes: Mutex<Vec<String>>,
    comments: Mutex<Vec<(String, String)>>,
    gifts: Mutex<Vec<(String, u32, u32)>>,
    failing: AtomicBool,
}

impl FakeActions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn like_count(&self) -> usize {
        self.likes.lock().len()
    }

    pub fn likes_for(&self, live_id: &str) -> usize {
        self.likes.lock().iter().filter(|id| *id == live_id).count()
    }

    pub fn comments(&self) -> Vec<(String, String)> {
        self.comments.lock().clone()
    }

    pub fn gifts(&self) -> Vec<(String, u32, u32)> {
        self.gifts.lock().clone()
    }

    fn result(&self) -> Result<(), ApiError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ApiError::Transport("unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ActionClient for FakeActions {
    async fn send_like(
        &self,
        _session: &Session,
        live_id: &str,
        _count: u32,
        _duration_ms: u32,
    ) -> Result<(), ApiError> {
        self.likes.lock().push(live_id.to_string());
        self.result()
    }

    async fn send_comment(
        &self,
        _session: &Session,
        live_id: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        self.comments
            .lock()
            .push((live_id.to_string(), content.to_string()));
        self.result()
    }

    async fn send_gift(
        &self,
        _session: &Session,
        live_id: &str,
        gift_id: u32,
        batch_size: u32,
        _combo_key: Option<&str>,
    ) -> Result<(), ApiError> {
        self.gifts
            .lock()
            .push((live_id.to_string(), gift_id, batch_size));
        self.result()
    }
}

/// Monitor wired to fakes, engagement disabled.
pub fn monitor(
    connector: Arc<FakeConnector>,
    actions: Arc<FakeActions>,
    dispatcher: EventDispatcher,
) -> Arc<LiveMonitor> {
    LiveMonitor::new(
        session(),
        connector,
        actions,
        dispatcher,
        Registries::new(),
        MonitorSettings {
            auto_engage: false,
            engage_interval: Duration::from_secs(30),
        },
    )
}

/// Poll `check` until it holds or roughly a second has passed.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
