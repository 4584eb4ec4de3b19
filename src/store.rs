//! JSON-file persistence for the work-item collection.
//!
//! The store is the single source of truth: every queue operation loads
//! the whole collection, mutates an in-memory copy, and saves it back.
//! No component holds authoritative state between calls.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::QueueError;
use crate::queue::WorkItem;

/// Name of the queue file inside the data directory.
const QUEUE_FILE: &str = "queue.json";

/// Durable read/replace of the full item collection.
///
/// A missing file or data directory reads as an empty collection. A
/// present but unparseable file is an error: degrading to empty would
/// silently drop the persisted queue on the next save.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    /// Store backed by `<data_dir>/queue.json`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(QUEUE_FILE),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the full collection, preserving insertion order.
    pub fn load_all(&self) -> Result<Vec<WorkItem>, QueueError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Replaces the entire persisted collection, creating the data
    /// directory on first use.
    pub fn save_all(&self, items: &[WorkItem]) -> Result<(), QueueError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
