//! Batch record and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::errors::{BatchError, Result};
use super::ids::{BatchId, TaskId};

/// Last-known remote processing state of a batch.
///
/// State transitions (reported by the remote service, never inferred locally):
/// - Submitted -> InProgress -> Ended
/// - InProgress -> Canceling -> Ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Accepted locally, no remote status seen yet.
    Submitted,
    InProgress,
    /// Cancellation requested remotely; results are not final yet.
    Canceling,
    /// No further processing will occur; results can be retrieved.
    Ended,
}

impl BatchStatus {
    /// Is this the terminal state (results ready to drain)?
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Ended)
    }

    /// Map the remote `processing_status` string.
    pub fn from_remote(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(BatchStatus::InProgress),
            "canceling" => Some(BatchStatus::Canceling),
            "ended" => Some(BatchStatus::Ended),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Submitted => "submitted",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Canceling => "canceling",
            BatchStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item-level counts reported by the remote service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub succeeded: u64,
    #[serde(default)]
    pub errored: u64,
    #[serde(default)]
    pub canceled: u64,
    #[serde(default)]
    pub expired: u64,
}

impl RequestCounts {
    pub fn finished(&self) -> u64 {
        self.succeeded + self.errored + self.canceled + self.expired
    }

    pub fn total(&self) -> u64 {
        self.processing + self.finished()
    }
}

impl fmt::Display for RequestCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.finished(), self.total())
    }
}

/// A group of tasks submitted together under one remote id.
///
/// `task_ids` is fixed at construction; only the cached status (and counts)
/// change afterwards. The `task_count` field of older registry files is
/// ignored; it is always `task_ids.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(rename = "id")]
    batch_id: BatchId,
    status: BatchStatus,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    created_at: DateTime<Utc>,
    task_ids: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_counts: Option<RequestCounts>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::timestamp::deserialize_opt"
    )]
    updated_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(
        batch_id: BatchId,
        task_ids: Vec<TaskId>,
        status: BatchStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id,
            status,
            created_at,
            task_ids,
            request_counts: None,
            updated_at: None,
        }
    }

    pub fn with_counts(mut self, counts: Option<RequestCounts>) -> Self {
        self.request_counts = counts;
        self
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    pub fn member_task_ids(&self) -> &[TaskId] {
        &self.task_ids
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn request_counts(&self) -> Option<RequestCounts> {
        self.request_counts
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Copy the remote-reported state verbatim.
    pub fn record_status(
        &mut self,
        status: BatchStatus,
        counts: Option<RequestCounts>,
        at: DateTime<Utc>,
    ) {
        self.status = status;
        if counts.is_some() {
            self.request_counts = counts;
        }
        self.updated_at = Some(at);
    }
}

/// Active batches in registration order.
///
/// Written as a JSON array. Older registry files keyed batches by id in an
/// object; those are read in `created_at` order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchTable {
    batches: Vec<Batch>,
}

impl<'de> Deserialize<'de> for BatchTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Layout {
            Ordered(Vec<Batch>),
            Keyed(BTreeMap<String, Batch>),
        }

        let batches = match Layout::deserialize(deserializer)? {
            Layout::Ordered(batches) => batches,
            Layout::Keyed(map) => {
                let mut batches: Vec<Batch> = map.into_values().collect();
                batches.sort_by_key(|b| b.created_at);
                batches
            }
        };
        Ok(Self { batches })
    }
}

impl BatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn get(&self, batch_id: &BatchId) -> Option<&Batch> {
        self.batches.iter().find(|b| b.batch_id() == batch_id)
    }

    pub fn register(&mut self, batch: Batch) -> Result<()> {
        if self.get(batch.batch_id()).is_some() {
            return Err(BatchError::Conflict(format!(
                "batch {} is already registered",
                batch.batch_id()
            )));
        }
        self.batches.push(batch);
        Ok(())
    }

    pub fn update_status(
        &mut self,
        batch_id: &BatchId,
        status: BatchStatus,
        counts: Option<RequestCounts>,
        at: DateTime<Utc>,
    ) -> Result<Batch> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.batch_id() == batch_id)
            .ok_or_else(|| BatchError::NotFound(batch_id.clone()))?;
        batch.record_status(status, counts, at);
        Ok(batch.clone())
    }

    /// Remove a batch; absent ids are a no-op.
    pub fn remove(&mut self, batch_id: &BatchId) -> Option<Batch> {
        let pos = self.batches.iter().position(|b| b.batch_id() == batch_id)?;
        Some(self.batches.remove(pos))
    }
}
