//! Outcome model: per-task results of a drained batch.
//!
//! The remote service streams results in whatever order it finishes them, so
//! everything here keys on `task_id` and never on position.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::Batch;
use super::ids::{BatchId, TaskId};

/// Classification of one task's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Succeeded,
    /// Older archives also record remote `canceled` / `expired` results.
    #[serde(alias = "canceled", alias = "expired")]
    Errored,
}

/// Error text used for a member task the remote stream did not mention.
pub const MISSING_RESULT: &str = "no result returned";

/// Result of one task: a success payload or an error description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    #[serde(rename = "custom_id")]
    pub task_id: TaskId,

    #[serde(rename = "type")]
    pub kind: OutcomeKind,

    pub content: Option<String>,

    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn succeeded(task_id: TaskId, content: impl Into<String>) -> Self {
        Self {
            task_id,
            kind: OutcomeKind::Succeeded,
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn errored(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            kind: OutcomeKind::Errored,
            content: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Succeeded
    }

    /// Content (or error text) cut to `max_chars`, with "..." when truncated.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self
            .content
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default();
        super::clip(text, max_chars)
    }
}

/// Durable outcome of one drained batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub batch_id: BatchId,
    #[serde(alias = "completed_at", deserialize_with = "super::timestamp::deserialize")]
    pub retrieved_at: DateTime<Utc>,
    #[serde(rename = "results")]
    pub outcomes: Vec<TaskOutcome>,
}

impl ResultRecord {
    /// Re-associate remote outcomes with the batch's member tasks.
    ///
    /// Outcomes come back in member order. A member with no remote result gets
    /// an errored outcome; remote results for ids that are not members are
    /// returned separately so the caller can report them.
    pub fn assemble(
        batch: &Batch,
        remote: Vec<TaskOutcome>,
        retrieved_at: DateTime<Utc>,
    ) -> (Self, Vec<TaskOutcome>) {
        let mut by_id: HashMap<TaskId, TaskOutcome> = HashMap::with_capacity(remote.len());
        let mut strays = Vec::new();
        for outcome in remote {
            if !batch.member_task_ids().contains(&outcome.task_id) {
                strays.push(outcome);
                continue;
            }
            // First result wins if the stream repeats an id.
            if by_id.contains_key(&outcome.task_id) {
                strays.push(outcome);
            } else {
                by_id.insert(outcome.task_id.clone(), outcome);
            }
        }

        let outcomes = batch
            .member_task_ids()
            .iter()
            .map(|id| {
                by_id
                    .remove(id)
                    .unwrap_or_else(|| TaskOutcome::errored(id.clone(), MISSING_RESULT))
            })
            .collect();

        let record = Self {
            batch_id: batch.batch_id().clone(),
            retrieved_at,
            outcomes,
        };
        (record, strays)
    }

    pub fn outcome(&self, task_id: &TaskId) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| &o.task_id == task_id)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn errored(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BatchStatus;

    fn batch_abc() -> Batch {
        Batch::new(
            BatchId::new("b-1"),
            vec![TaskId::new("A"), TaskId::new("B"), TaskId::new("C")],
            BatchStatus::Ended,
            Utc::now(),
        )
    }

    #[test]
    fn assemble_reassociates_by_id_not_position() {
        let remote = vec![
            TaskOutcome::succeeded(TaskId::new("C"), "answer C"),
            TaskOutcome::errored(TaskId::new("A"), "rate limit"),
            TaskOutcome::succeeded(TaskId::new("B"), "answer B"),
        ];

        let (record, strays) = ResultRecord::assemble(&batch_abc(), remote, Utc::now());

        assert!(strays.is_empty());
        let ids: Vec<&str> = record.outcomes.iter().map(|o| o.task_id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "C"]);
        assert_eq!(
            record.outcome(&TaskId::new("A")).unwrap().error.as_deref(),
            Some("rate limit")
        );
        assert_eq!(
            record.outcome(&TaskId::new("C")).unwrap().content.as_deref(),
            Some("answer C")
        );
        assert_eq!(record.succeeded(), 2);
        assert_eq!(record.errored(), 1);
    }

    #[test]
    fn assemble_fills_missing_and_reports_strays() {
        let remote = vec![
            TaskOutcome::succeeded(TaskId::new("B"), "b"),
            TaskOutcome::succeeded(TaskId::new("Z"), "not ours"),
            TaskOutcome::succeeded(TaskId::new("B"), "duplicate"),
        ];

        let (record, strays) = ResultRecord::assemble(&batch_abc(), remote, Utc::now());

        assert_eq!(record.outcomes.len(), 3);
        assert_eq!(
            record.outcome(&TaskId::new("A")).unwrap().error.as_deref(),
            Some(MISSING_RESULT)
        );
        assert_eq!(
            record.outcome(&TaskId::new("B")).unwrap().content.as_deref(),
            Some("b")
        );
        assert_eq!(strays.len(), 2);
    }

    #[test]
    fn preview_truncates_long_content() {
        let o = TaskOutcome::succeeded(TaskId::new("A"), "x".repeat(120));
        let p = o.preview(100);
        assert_eq!(p.len(), 103);
        assert!(p.ends_with("..."));

        let short = TaskOutcome::errored(TaskId::new("A"), "boom");
        assert_eq!(short.preview(100), "boom");
    }

    #[test]
    fn record_serializes_with_archive_field_names() {
        let (record, _) = ResultRecord::assemble(
            &batch_abc(),
            vec![TaskOutcome::succeeded(TaskId::new("A"), "hi")],
            Utc::now(),
        );
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["batch_id"], "b-1");
        assert_eq!(v["results"][0]["custom_id"], "A");
        assert_eq!(v["results"][0]["type"], "succeeded");
        assert_eq!(v["results"][1]["type"], "errored");
    }
}
