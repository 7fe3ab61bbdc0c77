//! Report - 各操作の結果
//!
//! Sweeps (`poll_all`, `drain_all`) never stop at the first failing batch;
//! each batch gets its own entry and the caller decides how to present it.

use crate::domain::{Batch, BatchError, BatchId, BatchStatus, ResultRecord, Task, TaskOutcome};
use crate::ports::ArchiveLocation;

#[derive(Debug, Clone)]
pub struct EnqueueReport {
    pub task: Task,
    /// Pending tasks after this one was added.
    pub queue_depth: usize,
}

#[derive(Debug)]
pub enum SubmitReport {
    /// The queue was empty; nothing was sent and nothing changed.
    NothingToSubmit,
    Submitted { batch: Batch },
    /// The batch is live and registered, but its tasks are still queued
    /// and would be sent again by the next submit.
    SubmittedQueueNotCleared { batch: Batch, error: BatchError },
}

impl SubmitReport {
    pub fn batch(&self) -> Option<&Batch> {
        match self {
            Self::NothingToSubmit => None,
            Self::Submitted { batch } | Self::SubmittedQueueNotCleared { batch, .. } => Some(batch),
        }
    }
}

/// Per-batch result of a status check.
#[derive(Debug)]
pub struct PollEntry {
    pub batch_id: BatchId,
    /// Cached status before this poll.
    pub previous: BatchStatus,
    pub result: Result<Batch, BatchError>,
}

impl PollEntry {
    pub fn changed(&self) -> bool {
        matches!(&self.result, Ok(batch) if batch.status() != self.previous)
    }
}

#[derive(Debug, Default)]
pub struct PollReport {
    pub entries: Vec<PollEntry>,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_err()).count()
    }

    /// Batches whose cached status is now terminal.
    pub fn ready(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, Ok(b) if b.is_terminal()))
            .count()
    }
}

#[derive(Debug)]
pub enum DrainEntry {
    /// Results fetched, archived, and the batch deregistered.
    Drained {
        record: ResultRecord,
        location: ArchiveLocation,
        /// Remote results whose id was not a member of the batch.
        strays: Vec<TaskOutcome>,
    },
    /// A record from an earlier, interrupted drain was found; the batch was
    /// only deregistered.
    AlreadyArchived {
        batch_id: BatchId,
        location: ArchiveLocation,
    },
    /// Cached status is not terminal yet; left alone.
    NotReady {
        batch_id: BatchId,
        status: BatchStatus,
    },
    /// Retrieval or archival failed; the batch stays registered for a retry.
    Failed {
        batch_id: BatchId,
        error: BatchError,
    },
}

impl DrainEntry {
    pub fn batch_id(&self) -> &BatchId {
        match self {
            DrainEntry::Drained { record, .. } => &record.batch_id,
            DrainEntry::AlreadyArchived { batch_id, .. }
            | DrainEntry::NotReady { batch_id, .. }
            | DrainEntry::Failed { batch_id, .. } => batch_id,
        }
    }
}

#[derive(Debug, Default)]
pub struct DrainReport {
    pub entries: Vec<DrainEntry>,
}

impl DrainReport {
    /// Whether any terminal batch was seen (drained, skipped, or failed).
    pub fn had_terminal(&self) -> bool {
        self.entries
            .iter()
            .any(|e| !matches!(e, DrainEntry::NotReady { .. }))
    }

    pub fn drained(&self) -> impl Iterator<Item = &ResultRecord> {
        self.entries.iter().filter_map(|e| match e {
            DrainEntry::Drained { record, .. } => Some(record),
            _ => None,
        })
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, DrainEntry::Failed { .. }))
            .count()
    }
}
