//! Web server shared state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::monitor::LiveMonitor;

/// State handed to every API handler.
pub struct WebState {
    pub monitor: Arc<LiveMonitor>,
    /// Filter list file used by the reload endpoint.
    pub filter_path: PathBuf,
}

impl WebState {
    pub fn new(monitor: Arc<LiveMonitor>, filter_path: PathBuf) -> Self {
        Self {
            monitor,
            filter_path,
        }
    }
}
