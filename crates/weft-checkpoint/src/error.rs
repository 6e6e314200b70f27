//! Error types for channel and checkpoint operations

use thiserror::Error;

/// Convenience result type using [`CheckpointError`]
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors raised by channels and checkpoint savers
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// A channel received an update it cannot accept, e.g. a last-value
    /// channel written twice in one superstep. The message names the key.
    #[error("{0}")]
    InvalidUpdate(String),

    /// Read of a channel that holds no value
    #[error("Channel '{0}' is empty")]
    EmptyChannel(String),

    /// A checkpoint payload could not be restored into a channel
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// Required configuration was missing or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested checkpoint does not exist
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// Serialization of a checkpoint or channel snapshot failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckpointError {
    /// The canonical multi-write error for single-slot channels.
    pub fn single_value_violation(key: &str) -> Self {
        CheckpointError::InvalidUpdate(format!(
            "At key '{key}': Can receive only one value per step."
        ))
    }
}
