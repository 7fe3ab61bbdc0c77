//! BatchRegistry port - 提出済みバッチのキャッシュ
//!
//! The registry caches the last status the remote service reported. It is
//! not a state-machine authority and accepts whatever status it is given.

use chrono::{DateTime, Utc};

use crate::domain::{Batch, BatchId, BatchStatus, RequestCounts, Result};

pub trait BatchRegistry: Send + Sync {
    /// Fails with `Conflict` if the batch id is already registered.
    fn register(&self, batch: Batch) -> Result<()>;

    /// Fails with `NotFound` if the batch id is unknown.
    fn update_status(
        &self,
        batch_id: &BatchId,
        status: BatchStatus,
        counts: Option<RequestCounts>,
        at: DateTime<Utc>,
    ) -> Result<Batch>;

    /// Idempotent: removing an absent batch returns `Ok(None)`.
    fn remove(&self, batch_id: &BatchId) -> Result<Option<Batch>>;

    /// Snapshot in registration order.
    fn list(&self) -> Result<Vec<Batch>>;

    fn get(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|b| b.batch_id() == batch_id))
    }
}
