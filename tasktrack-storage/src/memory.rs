//! In-memory task store with staged writes.
//!
//! Writes are recorded in a pending journal and applied to the committed map
//! on [`TaskStore::commit`]. Reads only observe committed state; write
//! ownership checks see committed state overlaid with pending writes, so a
//! create followed by an update in the same unit of work behaves as expected.
//!
//! There is one journal per store, shared by every clone of the handle: a
//! `commit` publishes everything staged so far, whoever staged it. Callers
//! that share a store and need per-request units of work must serialize
//! stage and commit themselves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use ::async_trait::async_trait;
use tasktrack_core::{
    Identity, Priority, Status, StorageError, TaskDraft, TaskId, TaskQuery, TaskRecord,
    TaskTrackResult,
};

use crate::store::TaskStore;

#[derive(Debug, Clone)]
enum PendingWrite {
    Upsert(TaskRecord),
    Remove(TaskId),
}

/// In-memory [`TaskStore`] for development and tests.
#[derive(Debug, Clone)]
pub struct InMemoryTaskStore {
    committed: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
    pending: Arc<Mutex<Vec<PendingWrite>>>,
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            committed: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Number of committed tasks across all identities.
    pub fn committed_len(&self) -> TaskTrackResult<usize> {
        let committed = self.committed.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(committed.len())
    }

    /// Number of staged writes not yet committed.
    pub fn pending_len(&self) -> TaskTrackResult<usize> {
        let pending = self.pending.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(pending.len())
    }

    fn select(&self, identity: &Identity, query: &TaskQuery) -> TaskTrackResult<Vec<TaskRecord>> {
        let committed = self.committed.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut records: Vec<TaskRecord> = committed
            .values()
            .filter(|record| &record.owner == identity && query.matches(record))
            .cloned()
            .collect();
        records.sort_by(TaskRecord::listing_order);
        Ok(records)
    }

    /// Resolve the current view of one task: committed state with pending
    /// writes replayed on top.
    fn staged_view(&self, id: TaskId) -> TaskTrackResult<Option<TaskRecord>> {
        let committed = self.committed.read().map_err(|_| StorageError::LockPoisoned)?;
        let pending = self.pending.lock().map_err(|_| StorageError::LockPoisoned)?;

        let mut current = committed.get(&id).cloned();
        for write in pending.iter() {
            match write {
                PendingWrite::Upsert(record) if record.id == id => current = Some(record.clone()),
                PendingWrite::Remove(removed) if *removed == id => current = None,
                _ => {}
            }
        }
        Ok(current)
    }

    fn stage(&self, write: PendingWrite) -> TaskTrackResult<()> {
        let mut pending = self.pending.lock().map_err(|_| StorageError::LockPoisoned)?;
        pending.push(write);
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list(&self, identity: &Identity) -> TaskTrackResult<Vec<TaskRecord>> {
        self.select(identity, &TaskQuery::ListAll)
    }

    async fn get(&self, id: TaskId, identity: &Identity) -> TaskTrackResult<Option<TaskRecord>> {
        let committed = self.committed.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(committed
            .get(&id)
            .filter(|record| &record.owner == identity)
            .cloned())
    }

    async fn filter_by_status(
        &self,
        status: Status,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.select(identity, &TaskQuery::ByStatus(status))
    }

    async fn filter_by_priority(
        &self,
        priority: Priority,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.select(identity, &TaskQuery::ByPriority(priority))
    }

    async fn search_by_title(
        &self,
        text: &str,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.select(identity, &TaskQuery::search_title(text))
    }

    async fn create(&self, draft: &TaskDraft, identity: &Identity) -> TaskTrackResult<TaskRecord> {
        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = TaskRecord::from_draft(id, draft.clone(), identity.clone());
        self.stage(PendingWrite::Upsert(record.clone()))?;
        Ok(record)
    }

    async fn update(
        &self,
        id: TaskId,
        draft: &TaskDraft,
        identity: &Identity,
    ) -> TaskTrackResult<bool> {
        let Some(mut record) = self.staged_view(id)? else {
            return Ok(false);
        };
        if &record.owner != identity {
            return Ok(false);
        }
        record.apply(draft);
        self.stage(PendingWrite::Upsert(record))?;
        Ok(true)
    }

    async fn delete(&self, id: TaskId, identity: &Identity) -> TaskTrackResult<bool> {
        match self.staged_view(id)? {
            Some(record) if &record.owner == identity => {
                self.stage(PendingWrite::Remove(id))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(&self) -> TaskTrackResult<()> {
        let mut committed = self.committed.write().map_err(|_| StorageError::LockPoisoned)?;
        let mut pending = self.pending.lock().map_err(|_| StorageError::LockPoisoned)?;
        for write in pending.drain(..) {
            match write {
                PendingWrite::Upsert(record) => {
                    committed.insert(record.id, record);
                }
                PendingWrite::Remove(id) => {
                    committed.remove(&id);
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
