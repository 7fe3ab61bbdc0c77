//! BatchClient port - リモートのバッチ推論サービス
//!
//! Stateless protocol adapter; implemented once against the real service
//! (`impls::AnthropicBatchClient`) and once as a scripted fake
//! (`impls::ScriptedBatchClient`).

use async_trait::async_trait;

use crate::domain::{BatchId, BatchRequest, BatchStatus, RequestCounts, Result, TaskOutcome};

/// Remote view of a batch, as returned by submit and status calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHandle {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub counts: Option<RequestCounts>,
}

#[async_trait]
pub trait BatchClient: Send + Sync {
    /// Submit all requests as one batch. Errors are `Submission`.
    async fn submit(&self, requests: &[BatchRequest]) -> Result<BatchHandle>;

    /// Current remote status. Errors are `Retrieval` scoped to `batch_id`.
    async fn status(&self, batch_id: &BatchId) -> Result<BatchHandle>;

    /// Per-request outcomes, in whatever order the service returns them.
    /// Errors are `Retrieval` scoped to `batch_id`.
    async fn results(&self, batch_id: &BatchId) -> Result<Vec<TaskOutcome>>;
}
