//! Queue configuration loaded from `dispatchq.toml`.
//!
//! [`QueueConfig`] holds every tunable the queue consumes. Values missing
//! from the file fall back to sensible defaults, so an absent file yields
//! a fully usable configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::QueueError;

/// Top-level configuration for the work queue.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Directory holding the persisted queue file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Retry ceiling stamped onto newly enqueued items.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl QueueConfig {
    /// Loads the configuration from `dispatchq.toml` in the current
    /// directory. Uses defaults if the file does not exist.
    pub fn load() -> Result<Self, QueueError> {
        Self::load_from(Path::new("dispatchq.toml"))
    }

    /// Loads the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, QueueError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }
}
