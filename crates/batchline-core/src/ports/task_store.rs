//! TaskStore port - 未提出タスクの正本
//!
//! # 実装
//! - `impls::InMemoryTaskStore`（テスト用）
//! - `impls::JsonTaskStore`（`batch_tasks/pending.json`）

use crate::domain::{Result, Task, TaskDraft, TaskId};

/// TaskStore は提出前のタスクを保持
///
/// # 設計原則
/// - 挿入順を保持する
/// - 各操作は全体の read-modify-write（部分更新なし）
/// - id の採番と重複チェックはここで行う（`TaskQueue::admit`）
pub trait TaskStore: Send + Sync {
    /// Admit a task; returns it with its final id.
    ///
    /// Fails with `Validation` for an empty payload and `Conflict` for a
    /// caller-supplied id that is already queued.
    fn enqueue(&self, draft: TaskDraft) -> Result<Task>;

    /// Pending tasks in insertion order.
    fn list(&self) -> Result<Vec<Task>>;

    fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Take every pending task and empty the store in one step.
    fn drain_all(&self) -> Result<Vec<Task>>;

    /// Remove exactly the given ids (those that were submitted).
    fn remove(&self, ids: &[TaskId]) -> Result<usize>;
}
