use thiserror::Error;

use crate::queue::Status;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Illegal status transition: {from} → {to}")]
    IllegalTransition { from: Status, to: Status },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
