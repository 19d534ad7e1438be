//! Registry of active room listeners.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use livewatch_protocol::{OwnerId, RoomDescriptor};

/// Lifecycle state of a room listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ListenerStatus {
    /// Created, task not yet running.
    Starting = 0,
    /// Task is consuming events.
    Active = 1,
    /// Released, waiting for the task to observe cancellation.
    Stopping = 2,
    /// Task has exited.
    Stopped = 3,
}

impl ListenerStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ListenerStatus::Starting,
            1 => ListenerStatus::Active,
            2 => ListenerStatus::Stopping,
            _ => ListenerStatus::Stopped,
        }
    }
}

/// Bookkeeping for one monitored room.
///
/// Membership in the registry is only changed by the monitor. The listener
/// task writes the status and the last event time of its own handle.
#[derive(Debug)]
pub struct ListenerHandle {
    pub owner_id: OwnerId,
    pub live_id: String,
    pub display_name: String,
    pub title: String,
    pub created_at: DateTime<Local>,
    generation: u64,
    /// Unix millis of the last received event, 0 if none yet.
    last_event_at: AtomicI64,
    status: AtomicU8,
    token: CancellationToken,
}

impl ListenerHandle {
    pub fn new(
        room: &RoomDescriptor,
        live_id: impl Into<String>,
        generation: u64,
        token: CancellationToken,
    ) -> Self {
        Self {
            owner_id: room.owner_id,
            live_id: live_id.into(),
            display_name: room.display_name.clone(),
            title: room.title.clone(),
            created_at: Local::now(),
            generation,
            last_event_at: AtomicI64::new(0),
            status: AtomicU8::new(ListenerStatus::Starting as u8),
            token,
        }
    }

    /// Registry-unique identity of this handle.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> ListenerStatus {
        ListenerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: ListenerStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Move from `Starting` to `Active`. Returns `false` when the handle was
    /// already released before its task got to run.
    pub fn mark_active(&self) -> bool {
        self.status
            .compare_exchange(
                ListenerStatus::Starting as u8,
                ListenerStatus::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Record that an event was just received.
    pub fn touch(&self) {
        self.last_event_at
            .store(Local::now().timestamp_millis(), Ordering::Release);
    }

    pub fn last_event_at(&self) -> Option<DateTime<Local>> {
        match self.last_event_at.load(Ordering::Acquire) {
            0 => None,
            millis => Local.timestamp_millis_opt(millis).single(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Serializable view for status output.
    pub fn info(&self) -> ListenerInfo {
        ListenerInfo {
            owner_id: self.owner_id,
            live_id: self.live_id.clone(),
            display_name: self.display_name.clone(),
            title: self.title.clone(),
            status: self.status(),
            generation: self.generation,
            created_at: self.created_at,
            last_event_at: self.last_event_at(),
            uptime_secs: (Local::now() - self.created_at).num_seconds().max(0) as u64,
        }
    }
}

/// Status of one listener as reported by the status API and reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    pub owner_id: OwnerId,
    pub live_id: String,
    pub display_name: String,
    pub title: String,
    pub status: ListenerStatus,
    pub generation: u64,
    pub created_at: DateTime<Local>,
    pub last_event_at: Option<DateTime<Local>>,
    pub uptime_secs: u64,
}

/// Map of owner id to its listener handle.
#[derive(Debug)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<OwnerId, Arc<ListenerHandle>>>,
    next_generation: AtomicU64,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Allocate a generation for a new handle.
    pub fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert `handle` if its owner has no listener yet.
    ///
    /// On conflict the existing handle is returned and nothing changes.
    pub async fn insert(&self, handle: Arc<ListenerHandle>) -> Result<(), Arc<ListenerHandle>> {
        let mut listeners = self.listeners.write().await;
        if let Some(existing) = listeners.get(&handle.owner_id) {
            return Err(existing.clone());
        }
        listeners.insert(handle.owner_id, handle);
        Ok(())
    }

    pub async fn get(&self, owner_id: OwnerId) -> Option<Arc<ListenerHandle>> {
        self.listeners.read().await.get(&owner_id).cloned()
    }

    pub async fn contains(&self, owner_id: OwnerId) -> bool {
        self.listeners.read().await.contains_key(&owner_id)
    }

    pub async fn remove(&self, owner_id: OwnerId) -> Option<Arc<ListenerHandle>> {
        self.listeners.write().await.remove(&owner_id)
    }

    /// Remove the handle for `owner_id` only if it still carries
    /// `generation`. A replaced handle is left untouched.
    pub async fn remove_generation(
        &self,
        owner_id: OwnerId,
        generation: u64,
    ) -> Option<Arc<ListenerHandle>> {
        let mut listeners = self.listeners.write().await;
        match listeners.get(&owner_id) {
            Some(handle) if handle.generation == generation => listeners.remove(&owner_id),
            _ => None,
        }
    }

    pub async fn owner_ids(&self) -> HashSet<OwnerId> {
        self.listeners.read().await.keys().copied().collect()
    }

    pub async fn count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Status of every listener, ordered by owner id.
    pub async fn snapshot(&self) -> Vec<ListenerInfo> {
        let mut infos: Vec<ListenerInfo> = self
            .listeners
            .read()
            .await
            .values()
            .map(|handle| handle.info())
            .collect();
        infos.sort_by_key(|info| info.owner_id);
        infos
    }

    /// Remove and return every handle.
    pub async fn drain(&self) -> Vec<Arc<ListenerHandle>> {
        self.listeners.write().await.drain().map(|(_, h)| h).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(registry: &ListenerRegistry, owner_id: OwnerId) -> Arc<ListenerHandle> {
        let room = RoomDescriptor::new(owner_id, format!("live-{}", owner_id));
        Arc::new(ListenerHandle::new(
            &room,
            room.live_id.clone(),
            registry.next_generation(),
            CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_owner() {
        let registry = ListenerRegistry::new();
        let first = handle(&registry, 1);
        let second = handle(&registry, 1);

        assert!(registry.insert(first.clone()).await.is_ok());
        let existing = registry.insert(second).await.unwrap_err();
        assert_eq!(existing.generation(), first.generation());
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_generation_ignores_replaced_handle() {
        let registry = ListenerRegistry::new();
        let old = handle(&registry, 1);
        registry.insert(old.clone()).await.unwrap();
        registry.remove(1).await;

        let new = handle(&registry, 1);
        registry.insert(new.clone()).await.unwrap();

        assert!(registry.remove_generation(1, old.generation()).await.is_none());
        assert!(registry.contains(1).await);
        assert!(registry.remove_generation(1, new.generation()).await.is_some());
        assert!(!registry.contains(1).await);
    }

    #[tokio::test]
    async fn test_snapshot_sorted_and_drain() {
        let registry = ListenerRegistry::new();
        for owner in [3, 1, 2] {
            registry.insert(handle(&registry, owner)).await.unwrap();
        }

        let owners: Vec<OwnerId> = registry.snapshot().await.iter().map(|i| i.owner_id).collect();
        assert_eq!(owners, vec![1, 2, 3]);

        assert_eq!(registry.drain().await.len(), 3);
        assert_eq!(registry.count().await, 0);
    }

    #[test]
    fn test_status_transitions() {
        let registry = ListenerRegistry::new();
        let h = handle(&registry, 1);
        assert_eq!(h.status(), ListenerStatus::Starting);
        assert!(h.mark_active());
        assert!(!h.mark_active());
        assert_eq!(h.status(), ListenerStatus::Active);

        h.set_status(ListenerStatus::Stopping);
        assert_eq!(h.status(), ListenerStatus::Stopping);
    }

    #[test]
    fn test_released_before_start_is_not_reactivated() {
        let registry = ListenerRegistry::new();
        let h = handle(&registry, 1);
        h.set_status(ListenerStatus::Stopping);
        assert!(!h.mark_active());
        assert_eq!(h.status(), ListenerStatus::Stopping);
    }

    #[test]
    fn test_touch_sets_last_event() {
        let registry = ListenerRegistry::new();
        let h = handle(&registry, 1);
        assert!(h.last_event_at().is_none());
        h.touch();
        assert!(h.last_event_at().is_some());
        assert_eq!(h.info().last_event_at, h.last_event_at());
    }

    #[test]
    fn test_info_serializes_timestamps_as_rfc3339() {
        let registry = ListenerRegistry::new();
        let h = handle(&registry, 1);
        let json = serde_json::to_value(h.info()).unwrap();
        assert!(json["last_event_at"].is_null());

        h.touch();
        let json = serde_json::to_value(h.info()).unwrap();
        let last = json["last_event_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(last).is_ok());
        assert!(DateTime::parse_from_rfc3339(json["created_at"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_generations_are_unique() {
        let registry = ListenerRegistry::new();
        let a = registry.next_generation();
        let b = registry.next_generation();
        assert_ne!(a, b);
    }
}
