//! File-backed task store and batch registry.
//!
//! Each operation loads the whole file, applies the change and writes the
//! whole file back through a temp file + rename, so a crash mid-write leaves
//! the previous contents intact.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::json_file::{read_json, write_json_atomic};
use crate::domain::{
    Batch, BatchId, BatchStatus, BatchTable, RequestCounts, Result, Task, TaskDraft, TaskId,
    TaskQueue,
};
use crate::ports::{BatchRegistry, IdGenerator, TaskStore};

/// Pending tasks in a JSON array (`batch_tasks/pending.json`).
pub struct JsonTaskStore {
    path: PathBuf,
    ids: Arc<dyn IdGenerator>,
    // Serializes read-modify-write within one process; the state lock covers
    // other processes.
    io: Mutex<()>,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            path: path.into(),
            ids,
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<R>(&self, f: impl FnOnce(&mut TaskQueue) -> Result<R>) -> Result<R> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        let mut queue: TaskQueue = read_json(&self.path)?;
        let out = f(&mut queue)?;
        write_json_atomic(&self.path, &queue)?;
        Ok(out)
    }

    fn load(&self) -> Result<TaskQueue> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        read_json(&self.path)
    }
}

impl TaskStore for JsonTaskStore {
    fn enqueue(&self, draft: TaskDraft) -> Result<Task> {
        self.update(|queue| queue.admit(draft, self.ids.as_ref()))
    }

    fn list(&self) -> Result<Vec<Task>> {
        Ok(self.load()?.tasks().to_vec())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    fn drain_all(&self) -> Result<Vec<Task>> {
        self.update(|queue| Ok(queue.take_all()))
    }

    fn remove(&self, ids: &[TaskId]) -> Result<usize> {
        self.update(|queue| Ok(queue.remove(ids)))
    }
}

/// Active batches in a JSON array (`batch_tasks/active.json`).
pub struct JsonBatchRegistry {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonBatchRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BatchTable> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        read_json(&self.path)
    }
}

impl BatchRegistry for JsonBatchRegistry {
    fn register(&self, batch: Batch) -> Result<()> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        let mut table: BatchTable = read_json(&self.path)?;
        table.register(batch)?;
        write_json_atomic(&self.path, &table)
    }

    fn update_status(
        &self,
        batch_id: &BatchId,
        status: BatchStatus,
        counts: Option<RequestCounts>,
        at: DateTime<Utc>,
    ) -> Result<Batch> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        let mut table: BatchTable = read_json(&self.path)?;
        let updated = table.update_status(batch_id, status, counts, at)?;
        write_json_atomic(&self.path, &table)?;
        Ok(updated)
    }

    fn remove(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        let mut table: BatchTable = read_json(&self.path)?;
        let removed = table.remove(batch_id);
        if removed.is_some() {
            write_json_atomic(&self.path, &table)?;
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<Batch>> {
        Ok(self.load()?.batches().to_vec())
    }

    fn get(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        Ok(self.load()?.get(batch_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchError, MessageParams};
    use crate::ports::{SequenceIdGenerator, TimestampIdGenerator};

    fn draft(prompt: &str, id: Option<&str>) -> TaskDraft {
        TaskDraft {
            id: id.map(TaskId::new),
            params: MessageParams::single_prompt("claude-haiku-4-5-20251001", 4096, prompt),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tasks_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_tasks").join("pending.json");

        let store = JsonTaskStore::new(&path, Arc::new(SequenceIdGenerator::new("t-")));
        store.enqueue(draft("p1", None)).unwrap();
        store.enqueue(draft("p2", Some("custom"))).unwrap();
        drop(store);

        let reopened = JsonTaskStore::new(&path, Arc::new(TimestampIdGenerator));
        let tasks = reopened.list().unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t-1", "custom"]);
        assert_eq!(tasks[0].params.prompt(), "p1");
    }

    #[test]
    fn duplicate_custom_id_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        let store = JsonTaskStore::new(&path, Arc::new(TimestampIdGenerator));
        store.enqueue(draft("first", Some("dup"))).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = store.enqueue(draft("second", Some("dup"))).unwrap_err();
        assert!(matches!(err, BatchError::Conflict(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn remove_only_drops_listed_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTaskStore::new(
            dir.path().join("pending.json"),
            Arc::new(SequenceIdGenerator::new("t-")),
        );
        store.enqueue(draft("a", None)).unwrap();
        store.enqueue(draft("b", None)).unwrap();
        store.enqueue(draft("c", None)).unwrap();

        let removed = store
            .remove(&[TaskId::new("t-1"), TaskId::new("t-2")])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.drain_all().unwrap()[0].id.as_str(), "t-3");
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn registry_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.json");
        let registry = JsonBatchRegistry::new(&path);

        let batch = Batch::new(
            BatchId::new("msgbatch_abc"),
            vec![TaskId::new("t-1")],
            BatchStatus::InProgress,
            Utc::now(),
        );
        registry.register(batch.clone()).unwrap();
        assert!(matches!(
            registry.register(batch),
            Err(BatchError::Conflict(_))
        ));

        let reopened = JsonBatchRegistry::new(&path);
        let updated = reopened
            .update_status(
                &BatchId::new("msgbatch_abc"),
                BatchStatus::Ended,
                Some(RequestCounts {
                    succeeded: 1,
                    ..RequestCounts::default()
                }),
                Utc::now(),
            )
            .unwrap();
        assert!(updated.is_terminal());

        let listed = JsonBatchRegistry::new(&path).list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status(), BatchStatus::Ended);
        assert_eq!(listed[0].member_task_ids(), &[TaskId::new("t-1")]);

        assert!(reopened.remove(&BatchId::new("msgbatch_abc")).unwrap().is_some());
        assert!(reopened.remove(&BatchId::new("msgbatch_abc")).unwrap().is_none());
        assert!(reopened.list().unwrap().is_empty());
    }

    #[test]
    fn queue_file_from_earlier_tooling_is_read_and_extended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        std::fs::write(
            &path,
            r#"[
  {
    "custom_id": "task-20250301-115900-0",
    "params": {
      "model": "claude-sonnet-4-5-20250929",
      "max_tokens": 4096,
      "messages": [{"role": "user", "content": "Summarise this"}]
    },
    "added_at": "2025-03-01T11:59:00.654321"
  }
]"#,
        )
        .unwrap();

        let store = JsonTaskStore::new(&path, Arc::new(SequenceIdGenerator::new("t-")));
        let tasks = store.list().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id.as_str(), "task-20250301-115900-0");
        assert_eq!(tasks[0].params.prompt(), "Summarise this");
        assert_eq!(
            tasks[0].created_at,
            crate::domain::timestamp::parse("2025-03-01T11:59:00.654321").unwrap()
        );

        store.enqueue(draft("next", None)).unwrap();
        let ids: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|t| t.id.as_str().to_owned())
            .collect();
        assert_eq!(ids, ["task-20250301-115900-0", "t-1"]);
    }

    #[test]
    fn keyed_registry_file_from_earlier_tooling_is_read_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.json");
        std::fs::write(
            &path,
            r#"{
  "msgbatch_01": {
    "id": "msgbatch_01",
    "status": "in_progress",
    "created_at": "2025-03-01T12:00:00.123456",
    "task_count": 2,
    "task_ids": ["task-20250301-115900-0", "task-20250301-115900-1"]
  }
}"#,
        )
        .unwrap();

        let registry = JsonBatchRegistry::new(&path);
        let b1 = BatchId::new("msgbatch_01");
        let listed = registry.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].member_task_ids().len(), 2);

        registry
            .update_status(&b1, BatchStatus::Ended, None, Utc::now())
            .unwrap();
        let rewritten: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(rewritten.is_array());

        let reread = JsonBatchRegistry::new(&path).get(&b1).unwrap().unwrap();
        assert_eq!(reread.status(), BatchStatus::Ended);
        assert_eq!(reread.created_at(), listed[0].created_at());
    }
}
