//! ScriptedBatchClient - テスト用のリモートサービス
//!
//! Batches get sequential ids (`b-1`, `b-2`, ...) and start `in_progress`.
//! Tests move them along with `set_status`, override their results, or
//! inject failures per call.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{
    BatchError, BatchId, BatchRequest, BatchStatus, RequestCounts, Result, TaskOutcome,
};
use crate::ports::{BatchClient, BatchHandle};

#[derive(Default)]
struct Script {
    next: u64,
    submitted: HashMap<BatchId, Vec<BatchRequest>>,
    status: HashMap<BatchId, BatchStatus>,
    results: HashMap<BatchId, Vec<TaskOutcome>>,
    fail_submit: Option<String>,
    fail_status: HashMap<BatchId, String>,
    fail_results: HashMap<BatchId, String>,
    results_calls: HashSet<BatchId>,
}

/// In-process fake of the remote batch service.
#[derive(Default)]
pub struct ScriptedBatchClient {
    script: Mutex<Script>,
}

impl ScriptedBatchClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The next `submit` fails with `message`.
    pub fn fail_next_submit(&self, message: impl Into<String>) {
        self.script().fail_submit = Some(message.into());
    }

    pub fn set_status(&self, batch_id: &BatchId, status: BatchStatus) {
        self.script().status.insert(batch_id.clone(), status);
    }

    /// Replace the default (echo) results of a batch.
    pub fn set_results(&self, batch_id: &BatchId, outcomes: Vec<TaskOutcome>) {
        self.script().results.insert(batch_id.clone(), outcomes);
    }

    pub fn fail_status(&self, batch_id: &BatchId, message: impl Into<String>) {
        self.script()
            .fail_status
            .insert(batch_id.clone(), message.into());
    }

    pub fn fail_results(&self, batch_id: &BatchId, message: impl Into<String>) {
        self.script()
            .fail_results
            .insert(batch_id.clone(), message.into());
    }

    pub fn clear_failures(&self) {
        let mut script = self.script();
        script.fail_submit = None;
        script.fail_status.clear();
        script.fail_results.clear();
    }

    /// Requests that went into a batch, if it was submitted here.
    pub fn submitted(&self, batch_id: &BatchId) -> Option<Vec<BatchRequest>> {
        self.script().submitted.get(batch_id).cloned()
    }

    /// Whether `results` was ever called for the batch.
    pub fn results_fetched(&self, batch_id: &BatchId) -> bool {
        self.script().results_calls.contains(batch_id)
    }

    fn counts(script: &Script, batch_id: &BatchId, status: BatchStatus) -> RequestCounts {
        let total = script
            .submitted
            .get(batch_id)
            .map(|r| r.len() as u64)
            .unwrap_or_default();
        if status.is_terminal() {
            RequestCounts {
                succeeded: total,
                ..RequestCounts::default()
            }
        } else {
            RequestCounts {
                processing: total,
                ..RequestCounts::default()
            }
        }
    }
}

#[async_trait]
impl BatchClient for ScriptedBatchClient {
    async fn submit(&self, requests: &[BatchRequest]) -> Result<BatchHandle> {
        let mut script = self.script();
        if let Some(message) = script.fail_submit.take() {
            return Err(BatchError::Submission(message));
        }
        script.next += 1;
        let batch_id = BatchId::new(format!("b-{}", script.next));
        script.submitted.insert(batch_id.clone(), requests.to_vec());
        script.status.insert(batch_id.clone(), BatchStatus::InProgress);
        let counts = Self::counts(&script, &batch_id, BatchStatus::InProgress);
        Ok(BatchHandle {
            batch_id,
            status: BatchStatus::InProgress,
            counts: Some(counts),
        })
    }

    async fn status(&self, batch_id: &BatchId) -> Result<BatchHandle> {
        let script = self.script();
        if let Some(message) = script.fail_status.get(batch_id) {
            return Err(BatchError::retrieval(batch_id, message.clone()));
        }
        let status = *script
            .status
            .get(batch_id)
            .ok_or_else(|| BatchError::retrieval(batch_id, "HTTP 404: batch not found"))?;
        Ok(BatchHandle {
            batch_id: batch_id.clone(),
            status,
            counts: Some(Self::counts(&script, batch_id, status)),
        })
    }

    async fn results(&self, batch_id: &BatchId) -> Result<Vec<TaskOutcome>> {
        let mut script = self.script();
        script.results_calls.insert(batch_id.clone());
        if let Some(message) = script.fail_results.get(batch_id) {
            return Err(BatchError::retrieval(batch_id, message.clone()));
        }
        if let Some(outcomes) = script.results.get(batch_id) {
            return Ok(outcomes.clone());
        }
        let requests = script
            .submitted
            .get(batch_id)
            .ok_or_else(|| BatchError::retrieval(batch_id, "HTTP 404: batch not found"))?;
        Ok(requests
            .iter()
            .map(|r| TaskOutcome::succeeded(r.custom_id.clone(), r.params.prompt()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageParams, TaskId};

    fn request(id: &str, prompt: &str) -> BatchRequest {
        BatchRequest {
            custom_id: TaskId::new(id),
            params: MessageParams::single_prompt("m", 16, prompt),
        }
    }

    #[tokio::test]
    async fn batches_get_sequential_ids_and_echo_results() {
        let client = ScriptedBatchClient::new();
        let first = client.submit(&[request("t-1", "one")]).await.unwrap();
        let second = client.submit(&[request("t-2", "two")]).await.unwrap();
        assert_eq!(first.batch_id.as_str(), "b-1");
        assert_eq!(second.batch_id.as_str(), "b-2");

        let results = client.results(&first.batch_id).await.unwrap();
        assert_eq!(results, vec![TaskOutcome::succeeded(TaskId::new("t-1"), "one")]);
        assert!(client.results_fetched(&first.batch_id));
        assert!(!client.results_fetched(&second.batch_id));
    }

    #[tokio::test]
    async fn injected_failures_apply_until_cleared() {
        let client = ScriptedBatchClient::new();
        client.fail_next_submit("HTTP 529: overloaded");
        assert!(matches!(
            client.submit(&[request("t-1", "x")]).await,
            Err(BatchError::Submission(_))
        ));
        let handle = client.submit(&[request("t-1", "x")]).await.unwrap();

        client.fail_status(&handle.batch_id, "HTTP 500");
        assert!(client.status(&handle.batch_id).await.unwrap_err().is_batch_scoped());
        client.clear_failures();

        client.set_status(&handle.batch_id, BatchStatus::Ended);
        let status = client.status(&handle.batch_id).await.unwrap();
        assert_eq!(status.status, BatchStatus::Ended);
        assert_eq!(status.counts.unwrap().to_string(), "1/1");
    }
}
