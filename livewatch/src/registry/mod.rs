//! Shared registries mutated by the monitor.

pub mod listener;
pub mod stream;

use std::sync::Arc;

pub use listener::{ListenerHandle, ListenerInfo, ListenerRegistry, ListenerStatus};
pub use stream::StreamRegistry;

use crate::filter::FilterSet;

/// The registries a monitor works on, constructed once at startup.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub listeners: Arc<ListenerRegistry>,
    pub streams: Arc<StreamRegistry>,
    pub filter: Arc<FilterSet>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }
}
