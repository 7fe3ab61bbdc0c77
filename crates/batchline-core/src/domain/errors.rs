//! Errors - エラー型と分類
//!
//! Failures inside a poll or drain sweep are carried as values in the
//! per-batch report entries; the sweep itself only aborts on errors raised
//! before it starts (lock, registry read). `is_batch_scoped` tells the
//! remote-side failures of one batch apart from local state failures, which
//! are logged louder.

use std::path::PathBuf;

use thiserror::Error;

use super::ids::BatchId;

/// Result alias used across batchline-core.
pub type Result<T> = std::result::Result<T, BatchError>;

#[derive(Debug, Error)]
pub enum BatchError {
    /// Malformed or empty input (empty prompt, bad custom id, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate identifier (task id already queued, batch id already registered).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("batch not found: {0}")]
    NotFound(BatchId),

    /// The remote service rejected or failed the submission call.
    #[error("batch submission failed: {0}")]
    Submission(String),

    /// Status or result retrieval failed for one batch.
    #[error("retrieval failed for {batch_id}: {message}")]
    Retrieval { batch_id: BatchId, message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed state file {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Another controller instance holds the state lock.
    #[error("state is locked by another running batchline instance ({})", .0.display())]
    Locked(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BatchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn retrieval(batch_id: &BatchId, message: impl Into<String>) -> Self {
        Self::Retrieval {
            batch_id: batch_id.clone(),
            message: message.into(),
        }
    }

    /// Scoped to a single batch; a sweep reports it and moves on.
    pub fn is_batch_scoped(&self) -> bool {
        matches!(self, Self::Retrieval { .. } | Self::NotFound(_))
    }
}
