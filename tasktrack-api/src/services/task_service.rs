//! Task Service
//!
//! Composes the query cache and the task store for one identity at a time.
//! Listing reads go through the cache; single-task reads and all writes go
//! straight to the store, with each write followed by a commit.
//!
//! The store's staging journal is shared by every holder of the handle, so
//! each write and its commit run under one lock and form their own unit of
//! work. Another request's commit can never publish a write early.

use std::sync::Arc;

use tasktrack_core::{
    Identity, Priority, Status, TaskDraft, TaskId, TaskQuery, TaskRecord, TaskTrackError,
    ValidationError,
};
use tasktrack_storage::{CacheRead, QueryCache, TaskStore};

use tokio::sync::Mutex;

use crate::error::{ApiError, ApiResult};

/// Cache of raw listing results, before pagination.
pub type TaskListCache = QueryCache<Vec<TaskRecord>>;

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    cache: Arc<TaskListCache>,
    /// Held from the first staged write until its commit.
    unit_of_work: Arc<Mutex<()>>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, cache: Arc<TaskListCache>) -> Self {
        Self {
            store,
            cache,
            unit_of_work: Arc::new(Mutex::new(())),
        }
    }

    pub fn cache(&self) -> &Arc<TaskListCache> {
        &self.cache
    }

    // ========================================================================
    // CACHED READS
    // ========================================================================

    /// Run a listing query through the cache.
    ///
    /// On a miss the store is called with no cache lock held and the result
    /// is stored only if the call succeeds.
    pub async fn query(
        &self,
        identity: &Identity,
        query: &TaskQuery,
    ) -> ApiResult<CacheRead<Vec<TaskRecord>>> {
        let key = self.cache.key_for(identity, query);
        let store = Arc::clone(&self.store);

        let read = self
            .cache
            .get_or_compute(&key, || async move { store.run_query(query, identity).await })
            .await
            .map_err(|e: TaskTrackError| {
                tracing::error!(identity = %identity, query = %query, error = %e, "Task query failed");
                ApiError::from(e)
            })?;

        tracing::debug!(
            identity = %identity,
            query = %query,
            cache_hit = read.was_cache_hit(),
            results = read.value().len(),
            "Task query served"
        );
        Ok(read)
    }

    pub async fn list_all(&self, identity: &Identity) -> ApiResult<Arc<Vec<TaskRecord>>> {
        Ok(self.query(identity, &TaskQuery::ListAll).await?.into_shared())
    }

    pub async fn list_by_status(
        &self,
        identity: &Identity,
        status: Status,
    ) -> ApiResult<Arc<Vec<TaskRecord>>> {
        Ok(self.query(identity, &TaskQuery::ByStatus(status)).await?.into_shared())
    }

    pub async fn list_by_priority(
        &self,
        identity: &Identity,
        priority: Priority,
    ) -> ApiResult<Arc<Vec<TaskRecord>>> {
        Ok(self.query(identity, &TaskQuery::ByPriority(priority)).await?.into_shared())
    }

    /// Case-insensitive title search. The text is lower-cased before it
    /// reaches the key or the store.
    pub async fn search_by_title(
        &self,
        identity: &Identity,
        text: &str,
    ) -> ApiResult<Arc<Vec<TaskRecord>>> {
        Ok(self.query(identity, &TaskQuery::search_title(text)).await?.into_shared())
    }

    // ========================================================================
    // DIRECT READS AND WRITES
    // ========================================================================

    pub async fn get(&self, identity: &Identity, id: TaskId) -> ApiResult<TaskRecord> {
        self.store
            .get(id, identity)
            .await?
            .ok_or_else(|| ApiError::entity_not_found("Task", id))
    }

    pub async fn create(&self, identity: &Identity, draft: &TaskDraft) -> ApiResult<TaskRecord> {
        draft.validate()?;

        let record = {
            let _unit = self.unit_of_work.lock().await;
            let record = self.store.create(draft, identity).await?;
            self.store.commit().await?;
            record
        };
        self.after_write(identity);

        tracing::info!(identity = %identity, task_id = %record.id, "Task created");
        Ok(record)
    }

    /// Replace task `id`. `body_id` is the id the client sent in the body
    /// and must match.
    pub async fn update(
        &self,
        identity: &Identity,
        id: TaskId,
        body_id: TaskId,
        draft: &TaskDraft,
    ) -> ApiResult<()> {
        if id != body_id {
            return Err(ValidationError::IdMismatch { path: id, body: body_id }.into());
        }
        draft.validate()?;

        {
            let _unit = self.unit_of_work.lock().await;
            if !self.store.update(id, draft, identity).await? {
                return Err(ApiError::entity_not_found("Task", id));
            }
            self.store.commit().await?;
        }
        self.after_write(identity);

        tracing::info!(identity = %identity, task_id = %id, "Task updated");
        Ok(())
    }

    pub async fn delete(&self, identity: &Identity, id: TaskId) -> ApiResult<()> {
        {
            let _unit = self.unit_of_work.lock().await;
            if !self.store.delete(id, identity).await? {
                return Err(ApiError::entity_not_found("Task", id));
            }
            self.store.commit().await?;
        }
        self.after_write(identity);

        tracing::info!(identity = %identity, task_id = %id, "Task deleted");
        Ok(())
    }

    /// Writes leave the cache alone unless write invalidation is enabled,
    /// so reads may lag a write by up to one TTL.
    fn after_write(&self, identity: &Identity) {
        if self.cache.config().invalidate_on_write {
            let dropped = self.cache.invalidate_identity(identity);
            tracing::debug!(identity = %identity, dropped, "Invalidated cached queries after write");
        }
    }
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("cache", &self.cache.config())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tasktrack_core::StorageError;
    use tasktrack_storage::{CacheConfig, InMemoryTaskStore, KeyMode};
    use tasktrack_test_utils::{CountingTaskStore, FailingTaskStore};

    fn ident(raw: &str) -> Identity {
        Identity::parse(raw).expect("valid identity")
    }

    fn service_with(config: CacheConfig) -> (TaskService, Arc<CountingTaskStore<InMemoryTaskStore>>) {
        let store = Arc::new(CountingTaskStore::new(InMemoryTaskStore::new()));
        let service = TaskService::new(store.clone(), Arc::new(QueryCache::new(config)));
        (service, store)
    }

    async fn seed(service: &TaskService, owner: &Identity) -> ApiResult<()> {
        service
            .create(owner, &TaskDraft::new("Plan the sprint").with_status(Status::Todo))
            .await?;
        service
            .create(owner, &TaskDraft::new("Ship the release").with_status(Status::InProgress))
            .await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_read_is_served_from_cache() -> ApiResult<()> {
        let (service, store) = service_with(CacheConfig::default());
        let u1 = ident("u1");
        seed(&service, &u1).await?;

        let first = service.list_all(&u1).await?;
        let second = service.list_all(&u1).await?;

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.read_calls(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_parameterized_keys_keep_filters_apart() -> ApiResult<()> {
        let (service, _store) = service_with(CacheConfig::default());
        let u1 = ident("u1");
        seed(&service, &u1).await?;

        let todo = service.list_by_status(&u1, Status::Todo).await?;
        let doing = service.list_by_status(&u1, Status::InProgress).await?;

        assert_eq!(todo.len(), 1);
        assert_eq!(todo[0].status, Status::Todo);
        assert_eq!(doing.len(), 1);
        assert_eq!(doing[0].status, Status::InProgress);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_keys_alias_filters() -> ApiResult<()> {
        let (service, store) = service_with(CacheConfig::default().with_key_mode(KeyMode::Legacy));
        let u1 = ident("u1");
        seed(&service, &u1).await?;

        let todo = service.list_by_status(&u1, Status::Todo).await?;
        let doing = service.list_by_status(&u1, Status::InProgress).await?;

        // the second filter is answered with the first filter's results
        assert!(Arc::ptr_eq(&todo, &doing));
        assert_eq!(doing[0].status, Status::Todo);
        assert_eq!(store.read_calls(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_do_not_invalidate_by_default() -> ApiResult<()> {
        let (service, _store) = service_with(CacheConfig::default());
        let u1 = ident("u1");
        seed(&service, &u1).await?;

        assert_eq!(service.list_all(&u1).await?.len(), 2);
        service.create(&u1, &TaskDraft::new("Review the budget")).await?;
        assert_eq!(service.list_all(&u1).await?.len(), 2);

        tokio::time::advance(std::time::Duration::from_secs(301)).await;
        assert_eq!(service.list_all(&u1).await?.len(), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_on_write_refreshes_own_entries_only() -> ApiResult<()> {
        let (service, _store) = service_with(CacheConfig::default().with_invalidate_on_write(true));
        let u1 = ident("u1");
        let u2 = ident("u2");
        seed(&service, &u1).await?;
        seed(&service, &u2).await?;

        service.list_all(&u1).await?;
        service.list_all(&u2).await?;
        service.create(&u1, &TaskDraft::new("Review the budget")).await?;

        assert_eq!(service.list_all(&u1).await?.len(), 3);
        assert!(service.cache().peek(&service.cache().key_for(&u2, &TaskQuery::ListAll)).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_identities_are_isolated() -> ApiResult<()> {
        let (service, _store) = service_with(CacheConfig::default());
        let u1 = ident("u1");
        let u2 = ident("u2");
        seed(&service, &u1).await?;

        assert_eq!(service.list_all(&u1).await?.len(), 2);
        assert!(service.list_all(&u2).await?.is_empty());

        let task = service.list_all(&u1).await?[0].clone();
        let err = service.get(&u2, task.id).await.err().map(|e| e.code);
        assert_eq!(err, Some(ErrorCode::EntityNotFound));

        let err = service.delete(&u2, task.id).await.err().map(|e| e.code);
        assert_eq!(err, Some(ErrorCode::EntityNotFound));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_checks_ids_and_existence() -> ApiResult<()> {
        let (service, _store) = service_with(CacheConfig::default());
        let u1 = ident("u1");
        let created = service.create(&u1, &TaskDraft::new("Plan the sprint")).await?;
        let draft = TaskDraft::new("Plan the next sprint").with_priority(Priority::High);

        let err = service.update(&u1, created.id, TaskId::new(999), &draft).await.err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::ValidationFailed));

        let err = service.update(&u1, TaskId::new(999), TaskId::new(999), &draft).await.err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::EntityNotFound));

        service.update(&u1, created.id, created.id, &draft).await?;
        let updated = service.get(&u1, created.id).await?;
        assert_eq!(updated.title, "Plan the next sprint");
        assert_eq!(updated.priority, Priority::High);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_validates_draft() {
        let (service, store) = service_with(CacheConfig::default());
        let err = service.create(&ident("u1"), &TaskDraft::new("abc")).await.err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::ValidationFailed));
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_lowercases_text() -> ApiResult<()> {
        let (service, _store) = service_with(CacheConfig::default());
        let u1 = ident("u1");
        seed(&service, &u1).await?;

        let hits = service.search_by_title(&u1, "SHIP").await?;
        assert_eq!(hits.len(), 1);
        assert!(service
            .cache()
            .peek(&service.cache().key_for(&u1, &TaskQuery::search_title("ship")))
            .is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_is_not_cached() {
        let store = Arc::new(FailingTaskStore::new(StorageError::LockPoisoned));
        let cache = Arc::new(QueryCache::with_defaults());
        let service = TaskService::new(store, cache.clone());

        let err = service.list_all(&ident("u1")).await.err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::StorageError));
        assert!(cache.is_empty());
    }

    /// Counts writes staged but not yet committed, and the most seen at once.
    #[derive(Default)]
    struct StagingTracker {
        inner: InMemoryTaskStore,
        open: std::sync::atomic::AtomicUsize,
        most_open: std::sync::atomic::AtomicUsize,
    }

    impl StagingTracker {
        async fn staged(&self) {
            use std::sync::atomic::Ordering;
            let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.most_open.fetch_max(now_open, Ordering::SeqCst);
            // give other requests a chance to interleave
            tokio::task::yield_now().await;
        }
    }

    #[async_trait::async_trait]
    impl TaskStore for StagingTracker {
        async fn list(&self, identity: &Identity) -> tasktrack_core::TaskTrackResult<Vec<TaskRecord>> {
            self.inner.list(identity).await
        }

        async fn get(
            &self,
            id: TaskId,
            identity: &Identity,
        ) -> tasktrack_core::TaskTrackResult<Option<TaskRecord>> {
            self.inner.get(id, identity).await
        }

        async fn filter_by_status(
            &self,
            status: Status,
            identity: &Identity,
        ) -> tasktrack_core::TaskTrackResult<Vec<TaskRecord>> {
            self.inner.filter_by_status(status, identity).await
        }

        async fn filter_by_priority(
            &self,
            priority: Priority,
            identity: &Identity,
        ) -> tasktrack_core::TaskTrackResult<Vec<TaskRecord>> {
            self.inner.filter_by_priority(priority, identity).await
        }

        async fn search_by_title(
            &self,
            text: &str,
            identity: &Identity,
        ) -> tasktrack_core::TaskTrackResult<Vec<TaskRecord>> {
            self.inner.search_by_title(text, identity).await
        }

        async fn create(
            &self,
            draft: &TaskDraft,
            identity: &Identity,
        ) -> tasktrack_core::TaskTrackResult<TaskRecord> {
            self.staged().await;
            self.inner.create(draft, identity).await
        }

        async fn update(
            &self,
            id: TaskId,
            draft: &TaskDraft,
            identity: &Identity,
        ) -> tasktrack_core::TaskTrackResult<bool> {
            self.staged().await;
            self.inner.update(id, draft, identity).await
        }

        async fn delete(&self, id: TaskId, identity: &Identity) -> tasktrack_core::TaskTrackResult<bool> {
            self.staged().await;
            self.inner.delete(id, identity).await
        }

        async fn commit(&self) -> tasktrack_core::TaskTrackResult<()> {
            tokio::task::yield_now().await;
            self.inner.commit().await?;
            self.open.store(0, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_commit_one_unit_at_a_time() -> ApiResult<()> {
        let store = Arc::new(StagingTracker::default());
        let service = TaskService::new(store.clone(), Arc::new(QueryCache::with_defaults()));

        let mut handles = Vec::new();
        for n in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let owner = ident(&format!("user-{}", n % 4));
                service.create(&owner, &TaskDraft::new(format!("Concurrent task {}", n))).await
            }));
        }
        for handle in handles {
            handle.await.map_err(|e| ApiError::internal_error(e.to_string()))??;
        }

        // no request ever saw another request's write staged alongside its own
        assert_eq!(store.most_open.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(store.inner.committed_len()?, 16);
        assert_eq!(store.inner.pending_len()?, 0);
        Ok(())
    }
}
