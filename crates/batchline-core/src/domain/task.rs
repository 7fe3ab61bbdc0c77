//! Task model: a prompt waiting to be submitted as part of a batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{BatchError, Result};
use super::ids::TaskId;
use crate::ports::IdGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body forwarded verbatim to the remote service as `params`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageParams {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl MessageParams {
    pub fn single_prompt(model: impl Into<String>, max_tokens: u32, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages: vec![Message::user(prompt)],
        }
    }

    /// Text of the first user message (used for listings).
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// First line of the prompt cut to `max_chars`; "..." marks anything
    /// left out, including further lines.
    pub fn prompt_preview(&self, max_chars: usize) -> String {
        let prompt = self.prompt();
        let line = prompt.lines().next().unwrap_or_default();
        let clipped = super::clip(line, max_chars);
        if clipped.len() == line.len() && line.len() < prompt.trim_end().len() {
            format!("{line}...")
        } else {
            clipped
        }
    }

    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(BatchError::Validation("model must not be empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(BatchError::Validation("max_tokens must be positive".into()));
        }
        if self.messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(BatchError::Validation("payload must not be empty".into()));
        }
        Ok(())
    }
}

/// A unit of work awaiting submission.
///
/// Field names on disk follow the queue file written by earlier tooling
/// (`custom_id`, `params`, `added_at`); its naive `added_at` times are read
/// as local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "custom_id")]
    pub id: TaskId,
    pub params: MessageParams,
    #[serde(rename = "added_at", deserialize_with = "super::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// The wire item for this task.
    pub fn to_request(&self) -> BatchRequest {
        BatchRequest {
            custom_id: self.id.clone(),
            params: self.params.clone(),
        }
    }
}

/// Input to `TaskStore::enqueue`: everything but the final id.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub id: Option<TaskId>,
    pub params: MessageParams,
    pub created_at: DateTime<Utc>,
}

/// One request inside a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: TaskId,
    pub params: MessageParams,
}

/// Ordered pending tasks.
///
/// Shared by every `TaskStore` implementation so the admission rules (id
/// assignment, duplicate rejection) are the same whether the queue lives in
/// memory or in a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskQueue {
    tasks: Vec<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.iter().any(|t| &t.id == id)
    }

    /// Admit a draft, assigning an id when none was supplied.
    ///
    /// Generated ids start at index `len()` and move forward until one is free,
    /// so they never collide with anything currently queued. A caller-supplied
    /// id that is already queued is rejected.
    pub fn admit(&mut self, draft: TaskDraft, ids: &dyn IdGenerator) -> Result<Task> {
        draft.params.validate()?;

        let id = match draft.id {
            Some(id) => {
                if self.contains(&id) {
                    return Err(BatchError::Conflict(format!("task {id} is already queued")));
                }
                id
            }
            None => {
                let mut index = self.tasks.len();
                loop {
                    let candidate = ids.task_id(draft.created_at, index);
                    if !self.contains(&candidate) {
                        break candidate;
                    }
                    index += 1;
                }
            }
        };

        let task = Task {
            id,
            params: draft.params,
            created_at: draft.created_at,
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Remove the given ids, keeping everything else in order.
    pub fn remove(&mut self, ids: &[TaskId]) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !ids.contains(&t.id));
        before - self.tasks.len()
    }

    /// Take every task, leaving the queue empty.
    pub fn take_all(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }
}
