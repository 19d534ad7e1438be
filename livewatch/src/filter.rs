//! Owner ids excluded from monitoring.
//!
//! The list file is plain text: one decimal owner id per line, blank lines
//! and lines starting with `#` are ignored. Lines that fail to parse are
//! skipped with a warning and never abort the load.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use parking_lot::RwLock;
use thiserror::Error;

use livewatch_protocol::OwnerId;

/// Errors raised while loading the filter list.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to read filter list {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Concurrency-safe set of excluded owner ids.
///
/// Lookups take a read lock. A reload swaps the whole set under a single
/// write lock, so readers observe either the old or the new set.
#[derive(Debug, Default)]
pub struct FilterSet {
    owner_ids: RwLock<HashSet<OwnerId>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = OwnerId>) -> Self {
        Self {
            owner_ids: RwLock::new(ids.into_iter().collect()),
        }
    }

    /// Whether rooms owned by `owner_id` must be skipped.
    pub fn should_filter(&self, owner_id: OwnerId) -> bool {
        self.owner_ids.read().contains(&owner_id)
    }

    /// Returns `true` if the id was not present before.
    pub fn add(&self, owner_id: OwnerId) -> bool {
        self.owner_ids.write().insert(owner_id)
    }

    /// Returns `true` if the id was present.
    pub fn remove(&self, owner_id: OwnerId) -> bool {
        self.owner_ids.write().remove(&owner_id)
    }

    pub fn len(&self) -> usize {
        self.owner_ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.owner_ids.read().is_empty()
    }

    /// Sorted copy of the current ids.
    pub fn snapshot(&self) -> Vec<OwnerId> {
        let mut ids: Vec<OwnerId> = self.owner_ids.read().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Replace the whole set.
    pub fn replace(&self, ids: HashSet<OwnerId>) {
        *self.owner_ids.write() = ids;
    }

    /// Reload the set from `path` and return the new entry count.
    ///
    /// A missing file produces an empty set. Any other I/O error is returned
    /// and the current set is kept.
    pub async fn reload(&self, path: &Path) -> Result<usize, FilterError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "Filter list {} not found, no rooms will be filtered",
                    path.display()
                );
                self.replace(HashSet::new());
                return Ok(0);
            }
            Err(source) => {
                return Err(FilterError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let ids = parse_filter_list(&content);
        let count = ids.len();
        self.replace(ids);
        info!("Loaded {} filtered owner ids from {}", count, path.display());
        Ok(count)
    }
}

/// Parse filter list content into a set of owner ids.
pub fn parse_filter_list(content: &str) -> HashSet<OwnerId> {
    let mut ids = HashSet::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<OwnerId>() {
            Ok(id) => {
                if !ids.insert(id) {
                    debug!("Duplicate filter entry {} on line {}", id, index + 1);
                }
            }
            Err(_) => warn!(
                "Invalid owner id on line {} of filter list: {:?}",
                index + 1,
                line
            ),
        }
    }
    ids
}
