//! Stream quality metadata per monitored room.

use std::collections::HashMap;

use tokio::sync::RwLock;

use livewatch_protocol::{OwnerId, StreamDescriptor, StreamVariant};

/// Best-known stream variants, keyed by owner id.
///
/// An entry exists exactly as long as the room's listener does.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<OwnerId, StreamDescriptor>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the descriptor for its owner.
    pub async fn insert(&self, descriptor: StreamDescriptor) {
        self.streams
            .write()
            .await
            .insert(descriptor.owner_id, descriptor);
    }

    pub async fn get(&self, owner_id: OwnerId) -> Option<StreamDescriptor> {
        self.streams.read().await.get(&owner_id).cloned()
    }

    pub async fn remove(&self, owner_id: OwnerId) -> Option<StreamDescriptor> {
        self.streams.write().await.remove(&owner_id)
    }

    pub async fn contains(&self, owner_id: OwnerId) -> bool {
        self.streams.read().await.contains_key(&owner_id)
    }

    pub async fn owner_ids(&self) -> Vec<OwnerId> {
        let mut ids: Vec<OwnerId> = self.streams.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }

    /// Variant with the lowest bitrate for `owner_id`, first one on ties.
    pub async fn lowest_quality_variant(&self, owner_id: OwnerId) -> Option<StreamVariant> {
        self.streams
            .read()
            .await
            .get(&owner_id)
            .and_then(|descriptor| descriptor.lowest_variant().cloned())
    }
}
