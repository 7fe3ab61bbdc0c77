//! In-memory stores (tests and embedding).

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::{
    Batch, BatchId, BatchStatus, BatchTable, RequestCounts, ResultRecord, Result, Task, TaskDraft,
    TaskId, TaskQueue,
};
use crate::ports::{
    ArchiveLocation, BatchRegistry, IdGenerator, ResultArchive, TaskStore,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct InMemoryTaskStore {
    queue: Mutex<TaskQueue>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryTaskStore {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            queue: Mutex::new(TaskQueue::new()),
            ids,
        }
    }
}

impl TaskStore for InMemoryTaskStore {
    fn enqueue(&self, draft: TaskDraft) -> Result<Task> {
        lock(&self.queue).admit(draft, self.ids.as_ref())
    }

    fn list(&self) -> Result<Vec<Task>> {
        Ok(lock(&self.queue).tasks().to_vec())
    }

    fn len(&self) -> Result<usize> {
        Ok(lock(&self.queue).len())
    }

    fn drain_all(&self) -> Result<Vec<Task>> {
        Ok(lock(&self.queue).take_all())
    }

    fn remove(&self, ids: &[TaskId]) -> Result<usize> {
        Ok(lock(&self.queue).remove(ids))
    }
}

#[derive(Default)]
pub struct InMemoryBatchRegistry {
    table: Mutex<BatchTable>,
}

impl InMemoryBatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchRegistry for InMemoryBatchRegistry {
    fn register(&self, batch: Batch) -> Result<()> {
        lock(&self.table).register(batch)
    }

    fn update_status(
        &self,
        batch_id: &BatchId,
        status: BatchStatus,
        counts: Option<RequestCounts>,
        at: DateTime<Utc>,
    ) -> Result<Batch> {
        lock(&self.table).update_status(batch_id, status, counts, at)
    }

    fn remove(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        Ok(lock(&self.table).remove(batch_id))
    }

    fn list(&self) -> Result<Vec<Batch>> {
        Ok(lock(&self.table).batches().to_vec())
    }

    fn get(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        Ok(lock(&self.table).get(batch_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryResultArchive {
    records: Mutex<Vec<(ArchiveLocation, ResultRecord)>>,
}

impl InMemoryResultArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record appended so far, oldest first.
    pub fn records(&self) -> Vec<ResultRecord> {
        lock(&self.records).iter().map(|(_, r)| r.clone()).collect()
    }
}

impl ResultArchive for InMemoryResultArchive {
    fn append(&self, record: &ResultRecord) -> Result<ArchiveLocation> {
        let mut records = lock(&self.records);
        let location = ArchiveLocation::new(format!(
            "memory/{}_{}.json",
            records.len(),
            record.batch_id.short(8)
        ));
        records.push((location.clone(), record.clone()));
        Ok(location)
    }

    fn locate(&self, batch_id: &BatchId) -> Result<Option<ArchiveLocation>> {
        Ok(lock(&self.records)
            .iter()
            .find(|(_, r)| &r.batch_id == batch_id)
            .map(|(loc, _)| loc.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchError, MessageParams};
    use crate::ports::SequenceIdGenerator;

    fn draft(prompt: &str) -> TaskDraft {
        TaskDraft {
            id: None,
            params: MessageParams::single_prompt("m", 16, prompt),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn task_store_drain_all_empties_in_one_step() {
        let store = InMemoryTaskStore::new(Arc::new(SequenceIdGenerator::new("t-")));
        store.enqueue(draft("p1")).unwrap();
        store.enqueue(draft("p2")).unwrap();

        let drained = store.drain_all().unwrap();
        let ids: Vec<&str> = drained.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t-1", "t-2"]);
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn registry_remove_is_a_noop_when_absent() {
        let registry = InMemoryBatchRegistry::new();
        assert!(registry.remove(&BatchId::new("ghost")).unwrap().is_none());
        assert!(matches!(
            registry.update_status(&BatchId::new("ghost"), BatchStatus::Ended, None, Utc::now()),
            Err(BatchError::NotFound(_))
        ));
    }

    #[test]
    fn archive_locations_are_unique() {
        let archive = InMemoryResultArchive::new();
        let record = ResultRecord {
            batch_id: BatchId::new("b-1"),
            retrieved_at: Utc::now(),
            outcomes: vec![],
        };
        let a = archive.append(&record).unwrap();
        let b = archive.append(&record).unwrap();
        assert_ne!(a, b);
        assert_eq!(archive.locate(&BatchId::new("b-1")).unwrap(), Some(a));
        assert_eq!(archive.records().len(), 2);
    }
}
