//! Domain identifiers (strongly-typed IDs).
//!
//! Task ids are chosen locally (caller-supplied or generated) and travel to the
//! remote service as `custom_id`; batch ids are assigned by the remote service.
//! Both are plain strings on the wire, so `Id<T>` wraps a `String` and uses a
//! phantom marker to keep the two from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use super::errors::{BatchError, Result};

/// Marker trait for identifier kinds.
pub trait IdMarker: Send + Sync + 'static {
    /// Human-readable kind, used in error messages.
    fn kind() -> &'static str;
}

/// Generic string identifier.
///
/// ```ignore
/// let task_id = TaskId::new("task-20250101-120000-0");
/// let batch_id = BatchId::new("msgbatch_01");
/// // let _: BatchId = task_id; // <- does not compile
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Wrap a value without validation (remote-assigned or already trusted).
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// First `n` characters, used for archive file names and previews.
    pub fn short(&self, n: usize) -> &str {
        match self.value.char_indices().nth(n) {
            Some((idx, _)) => &self.value[..idx],
            None => &self.value,
        }
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn kind() -> &'static str {
        "task"
    }
}

/// Batch のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Batch {}

impl IdMarker for Batch {
    fn kind() -> &'static str {
        "batch"
    }
}

/// Identifier of a queued task; sent to the remote service as `custom_id`.
pub type TaskId = Id<Task>;

/// Identifier of a submitted batch, assigned by the remote service.
pub type BatchId = Id<Batch>;

/// Longest `custom_id` the remote service accepts.
pub const MAX_TASK_ID_LEN: usize = 64;

impl TaskId {
    /// Parse a caller-supplied task id.
    ///
    /// The remote service only accepts `[A-Za-z0-9_-]{1,64}` as `custom_id`, so
    /// anything else is rejected here rather than at submission time.
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Err(BatchError::Validation(format!(
                "{} id must not be empty",
                Task::kind()
            )));
        }
        if value.len() > MAX_TASK_ID_LEN {
            return Err(BatchError::Validation(format!(
                "{} id {value:?} is longer than {MAX_TASK_ID_LEN} characters",
                Task::kind()
            )));
        }
        if let Some(bad) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(BatchError::Validation(format!(
                "{} id {value:?} contains {bad:?}; only letters, digits, '-' and '_' are allowed",
                Task::kind()
            )));
        }
        Ok(Self::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = BatchId::new("msgbatch_013Zva2CMHLNnXjNJJKqJ2EF");
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, "\"msgbatch_013Zva2CMHLNnXjNJJKqJ2EF\"");

        let back: BatchId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn short_truncates_on_char_boundary() {
        let id = BatchId::new("msgbatch_0123");
        assert_eq!(id.short(8), "msgbatch");
        assert_eq!(BatchId::new("b-1").short(8), "b-1");
    }

    #[rstest]
    #[case::generated("task-20250101-120000-0")]
    #[case::underscore("report_q3")]
    fn parse_accepts_valid_custom_ids(#[case] value: &str) {
        assert_eq!(TaskId::parse(value).unwrap().as_str(), value);
    }

    #[rstest]
    #[case::empty("")]
    #[case::space("two words")]
    #[case::slash("a/b")]
    fn parse_rejects_invalid_custom_ids(#[case] value: &str) {
        let err = TaskId::parse(value).unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
    }

    #[test]
    fn parse_enforces_length_limit() {
        let longest = "a".repeat(MAX_TASK_ID_LEN);
        assert!(TaskId::parse(&longest).is_ok());

        let too_long = "a".repeat(MAX_TASK_ID_LEN + 1);
        assert!(matches!(
            TaskId::parse(&too_long),
            Err(BatchError::Validation(_))
        ));
    }
}
