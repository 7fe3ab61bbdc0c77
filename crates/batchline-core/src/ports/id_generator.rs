//! IdGenerator port - Task ID 生成の抽象化
//!
//! # 実装
//! - **TimestampIdGenerator**: `task-YYYYmmdd-HHMMSS-<index>`（デフォルト）
//! - **UlidGenerator**: `task-<ULID>`（全期間で一意）
//! - **SequenceIdGenerator**: `<prefix><index + 1>`（テスト用）

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::domain::TaskId;

/// IdGenerator は task id の候補を生成
///
/// `index` is derived from the queue length at admission time; the queue asks
/// again with `index + 1` if a candidate is already taken.
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn task_id(&self, now: DateTime<Utc>, index: usize) -> TaskId;
}

/// Second-resolution timestamp plus queue index.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampIdGenerator;

impl IdGenerator for TimestampIdGenerator {
    fn task_id(&self, now: DateTime<Utc>, index: usize) -> TaskId {
        TaskId::new(format!("task-{}-{index}", now.format("%Y%m%d-%H%M%S")))
    }
}

/// ULID with the timestamp part taken from `now`.
///
/// Unique across every task ever created, not only the current queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidGenerator;

impl IdGenerator for UlidGenerator {
    fn task_id(&self, now: DateTime<Utc>, _index: usize) -> TaskId {
        let timestamp_ms = now.timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        TaskId::new(format!("task-{ulid}"))
    }
}

/// Deterministic `t-1`, `t-2`, ... style ids.
#[derive(Debug, Clone)]
pub struct SequenceIdGenerator {
    prefix: String,
}

impl SequenceIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn task_id(&self, _now: DateTime<Utc>, index: usize) -> TaskId {
        TaskId::new(format!("{}{}", self.prefix, index + 1))
    }
}
