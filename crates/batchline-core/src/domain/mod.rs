//! Domain model: tasks, batches, outcomes and the error type.
//!
//! Nothing here performs I/O. Stores and clients in `impls` persist or
//! transport these records.

pub mod batch;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod task;
pub(crate) mod timestamp;

pub use batch::{Batch, BatchStatus, BatchTable, RequestCounts};
pub use errors::{BatchError, Result};
pub use ids::{BatchId, TaskId};
pub use outcome::{MISSING_RESULT, OutcomeKind, ResultRecord, TaskOutcome};
pub use task::{BatchRequest, Message, MessageParams, Role, Task, TaskDraft, TaskQueue};

/// `text` cut to `max_chars` characters, with "..." appended when cut.
pub(crate) fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
