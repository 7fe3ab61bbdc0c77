//! LifecycleController - enqueue / submit / poll / drain
//!
//! # 順序の不変条件
//! - submit: リモート成功を確認してからキューを消す
//! - drain: アーカイブ書き込みが成功してからレジストリから外す
//! - 状態はリモートの報告をそのまま写す（ローカルで推測しない）

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::report::{
    DrainEntry, DrainReport, EnqueueReport, PollEntry, PollReport, SubmitReport,
};
use crate::config::ModelConfig;
use crate::domain::{
    Batch, BatchError, BatchRequest, MessageParams, ResultRecord, Result, Task, TaskDraft, TaskId,
};
use crate::ports::{
    BatchClient, BatchRegistry, Clock, ResultArchive, StateGuard, StateLock, TaskStore,
};

/// Input to [`LifecycleController::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueRequest {
    pub prompt: String,
    /// Caller-chosen id; generated when `None`.
    pub id: Option<String>,
    /// Model alias or full id; the configured default when `None`.
    pub model: Option<String>,
}

impl EnqueueRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Orchestrates the task queue, the batch registry, the result archive and
/// the remote batch service. Built with [`super::ControllerBuilder`].
pub struct LifecycleController {
    pub(super) tasks: Arc<dyn TaskStore>,
    pub(super) registry: Arc<dyn BatchRegistry>,
    pub(super) archive: Arc<dyn ResultArchive>,
    pub(super) client: Option<Arc<dyn BatchClient>>,
    pub(super) lock: Arc<dyn StateLock>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) models: ModelConfig,
}

impl LifecycleController {
    fn client(&self) -> Result<&dyn BatchClient> {
        self.client.as_deref().ok_or_else(|| {
            BatchError::Config(
                "no remote batch client configured; set ANTHROPIC_API_KEY".to_string(),
            )
        })
    }

    fn lock(&self) -> Result<StateGuard> {
        self.lock.acquire()
    }

    /// Queue one prompt.
    pub fn enqueue(&self, request: EnqueueRequest) -> Result<EnqueueReport> {
        let id = request.id.as_deref().map(TaskId::parse).transpose()?;
        let model = self.models.resolve(request.model.as_deref());
        let draft = TaskDraft {
            id,
            params: MessageParams::single_prompt(model, self.models.max_tokens, request.prompt),
            created_at: self.clock.now(),
        };

        let _guard = self.lock()?;
        let task = self.tasks.enqueue(draft)?;
        let queue_depth = self.tasks.len()?;
        info!(task_id = %task.id, model = %task.params.model, queue_depth, "task enqueued");
        Ok(EnqueueReport { task, queue_depth })
    }

    /// Pending tasks in insertion order.
    pub fn pending(&self) -> Result<Vec<Task>> {
        self.tasks.list()
    }

    /// Active batches in registration order.
    pub fn active(&self) -> Result<Vec<Batch>> {
        self.registry.list()
    }

    /// Submit every queued task as one batch.
    ///
    /// The queue is only cleared after the remote service has accepted the
    /// batch and the batch is registered locally. On remote failure nothing
    /// changes. If the queue cannot be cleared afterwards the batch is still
    /// reported, as [`SubmitReport::SubmittedQueueNotCleared`].
    pub async fn submit(&self) -> Result<SubmitReport> {
        let _guard = self.lock()?;

        let snapshot = self.tasks.list()?;
        if snapshot.is_empty() {
            info!("nothing to submit");
            return Ok(SubmitReport::NothingToSubmit);
        }
        let client = self.client()?;

        let requests: Vec<BatchRequest> = snapshot.iter().map(Task::to_request).collect();
        let task_ids: Vec<TaskId> = snapshot.iter().map(|t| t.id.clone()).collect();
        debug!(requests = requests.len(), "submitting batch");

        let handle = client.submit(&requests).await.inspect_err(|e| {
            warn!(error = %e, tasks = requests.len(), "submission failed; queue left intact");
        })?;

        let batch = Batch::new(handle.batch_id, task_ids, handle.status, self.clock.now())
            .with_counts(handle.counts);
        if let Err(e) = self.registry.register(batch.clone()) {
            // Remote batch exists but is not tracked; the tasks stay queued.
            error!(
                batch_id = %batch.batch_id(),
                error = %e,
                "remote batch created but could not be registered"
            );
            return Err(e);
        }

        match self.tasks.remove(batch.member_task_ids()) {
            Ok(removed) => {
                info!(
                    batch_id = %batch.batch_id(),
                    tasks = removed,
                    status = %batch.status(),
                    "batch submitted"
                );
                Ok(SubmitReport::Submitted { batch })
            }
            Err(error) => {
                error!(
                    batch_id = %batch.batch_id(),
                    error = %error,
                    "batch submitted and registered but its tasks are still queued"
                );
                Ok(SubmitReport::SubmittedQueueNotCleared { batch, error })
            }
        }
    }

    /// Refresh the cached status of every active batch.
    pub async fn poll_all(&self) -> Result<PollReport> {
        let _guard = self.lock()?;

        let batches = self.registry.list()?;
        let mut report = PollReport::default();
        if batches.is_empty() {
            return Ok(report);
        }
        let client = self.client()?;

        for batch in batches {
            let batch_id = batch.batch_id().clone();
            let previous = batch.status();
            let result = match client.status(&batch_id).await {
                Ok(handle) => self.registry.update_status(
                    &batch_id,
                    handle.status,
                    handle.counts,
                    self.clock.now(),
                ),
                Err(e) => Err(e),
            };

            match &result {
                Ok(updated) if updated.status() != previous => info!(
                    batch_id = %batch_id,
                    from = %previous,
                    to = %updated.status(),
                    "batch status changed"
                ),
                Ok(updated) => debug!(batch_id = %batch_id, status = %updated.status(), "batch unchanged"),
                Err(e) if e.is_batch_scoped() => {
                    warn!(batch_id = %batch_id, error = %e, "status check failed")
                }
                Err(e) => error!(batch_id = %batch_id, error = %e, "could not record batch status"),
            }
            report.entries.push(PollEntry {
                batch_id,
                previous,
                result,
            });
        }
        Ok(report)
    }

    /// Retrieve, archive and deregister every batch whose cached status is
    /// terminal. Batches that are not ready are listed but untouched.
    pub async fn drain_all(&self) -> Result<DrainReport> {
        let _guard = self.lock()?;

        let batches = self.registry.list()?;
        let mut report = DrainReport::default();
        for batch in batches {
            if !batch.is_terminal() {
                report.entries.push(DrainEntry::NotReady {
                    batch_id: batch.batch_id().clone(),
                    status: batch.status(),
                });
                continue;
            }

            let entry = match self.drain_one(&batch).await {
                Ok(entry) => entry,
                Err(e) => {
                    if e.is_batch_scoped() {
                        warn!(batch_id = %batch.batch_id(), error = %e, "drain failed; batch kept for retry");
                    } else {
                        error!(batch_id = %batch.batch_id(), error = %e, "drain failed on local state; batch kept for retry");
                    }
                    DrainEntry::Failed {
                        batch_id: batch.batch_id().clone(),
                        error: e,
                    }
                }
            };
            report.entries.push(entry);
        }
        Ok(report)
    }

    async fn drain_one(&self, batch: &Batch) -> Result<DrainEntry> {
        let batch_id = batch.batch_id();

        // An earlier drain may have archived and then died before deregistering.
        if let Some(location) = self.archive.locate(batch_id)? {
            self.registry.remove(batch_id)?;
            info!(batch_id = %batch_id, location = %location, "batch already archived; deregistered");
            return Ok(DrainEntry::AlreadyArchived {
                batch_id: batch_id.clone(),
                location,
            });
        }

        let outcomes = self.client()?.results(batch_id).await?;
        let (record, strays) = ResultRecord::assemble(batch, outcomes, self.clock.now());
        for stray in &strays {
            warn!(batch_id = %batch_id, task_id = %stray.task_id, "dropping result for unknown or repeated task id");
        }

        let location = self.archive.append(&record)?;
        self.registry.remove(batch_id)?;
        info!(
            batch_id = %batch_id,
            location = %location,
            succeeded = record.succeeded(),
            errored = record.errored(),
            "batch drained"
        );
        Ok(DrainEntry::Drained {
            record,
            location,
            strays,
        })
    }
}
