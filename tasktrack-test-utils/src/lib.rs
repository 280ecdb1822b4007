//! TaskTrack Test Utilities
//!
//! Centralized test infrastructure for the TaskTrack workspace:
//! - Proptest generators for identities, drafts and queries
//! - Task store doubles that count or fail calls
//! - Fixtures for common scenarios

pub use tasktrack_core::{
    Identity, Priority, Status, StorageError, TaskDraft, TaskId, TaskQuery, TaskRecord,
    TaskTrackError, TaskTrackResult, Timestamp,
};
pub use tasktrack_storage::{InMemoryTaskStore, TaskStore};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// STORE DOUBLES
// ============================================================================

/// Wraps a store and counts read and write calls.
///
/// Reads are `list`, `get` and the filter/search calls; writes are `create`,
/// `update` and `delete`. `commit` is counted separately.
#[derive(Debug, Default)]
pub struct CountingTaskStore<S> {
    inner: S,
    reads: AtomicU64,
    writes: AtomicU64,
    commits: AtomicU64,
}

impl<S: TaskStore> CountingTaskStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            commits: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn read_calls(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn commit_calls(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for CountingTaskStore<S> {
    async fn list(&self, identity: &Identity) -> TaskTrackResult<Vec<TaskRecord>> {
        self.read();
        self.inner.list(identity).await
    }

    async fn get(&self, id: TaskId, identity: &Identity) -> TaskTrackResult<Option<TaskRecord>> {
        self.read();
        self.inner.get(id, identity).await
    }

    async fn filter_by_status(
        &self,
        status: Status,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.read();
        self.inner.filter_by_status(status, identity).await
    }

    async fn filter_by_priority(
        &self,
        priority: Priority,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.read();
        self.inner.filter_by_priority(priority, identity).await
    }

    async fn search_by_title(
        &self,
        text: &str,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.read();
        self.inner.search_by_title(text, identity).await
    }

    async fn create(&self, draft: &TaskDraft, identity: &Identity) -> TaskTrackResult<TaskRecord> {
        self.write();
        self.inner.create(draft, identity).await
    }

    async fn update(
        &self,
        id: TaskId,
        draft: &TaskDraft,
        identity: &Identity,
    ) -> TaskTrackResult<bool> {
        self.write();
        self.inner.update(id, draft, identity).await
    }

    async fn delete(&self, id: TaskId, identity: &Identity) -> TaskTrackResult<bool> {
        self.write();
        self.inner.delete(id, identity).await
    }

    async fn commit(&self) -> TaskTrackResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit().await
    }
}

/// A store whose every call fails with the same error.
#[derive(Debug, Clone)]
pub struct FailingTaskStore {
    error: StorageError,
}

impl FailingTaskStore {
    pub fn new(error: StorageError) -> Self {
        Self { error }
    }

    fn fail<T>(&self) -> TaskTrackResult<T> {
        Err(TaskTrackError::Storage(self.error.clone()))
    }
}

impl Default for FailingTaskStore {
    fn default() -> Self {
        Self::new(StorageError::Unavailable {
            reason: "store offline".to_string(),
        })
    }
}

#[async_trait]
impl TaskStore for FailingTaskStore {
    async fn list(&self, _identity: &Identity) -> TaskTrackResult<Vec<TaskRecord>> {
        self.fail()
    }

    async fn get(&self, _id: TaskId, _identity: &Identity) -> TaskTrackResult<Option<TaskRecord>> {
        self.fail()
    }

    async fn filter_by_status(
        &self,
        _status: Status,
        _identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.fail()
    }

    async fn filter_by_priority(
        &self,
        _priority: Priority,
        _identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.fail()
    }

    async fn search_by_title(
        &self,
        _text: &str,
        _identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        self.fail()
    }

    async fn create(&self, _draft: &TaskDraft, _identity: &Identity) -> TaskTrackResult<TaskRecord> {
        self.fail()
    }

    async fn update(
        &self,
        _id: TaskId,
        _draft: &TaskDraft,
        _identity: &Identity,
    ) -> TaskTrackResult<bool> {
        self.fail()
    }

    async fn delete(&self, _id: TaskId, _identity: &Identity) -> TaskTrackResult<bool> {
        self.fail()
    }

    async fn commit(&self) -> TaskTrackResult<()> {
        self.fail()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for TaskTrack types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a non-blank identity.
    pub fn arb_identity() -> impl Strategy<Value = Identity> {
        "[a-z0-9]{1,12}".prop_filter_map("identity must be non-blank", |raw: String| Identity::parse(raw))
    }

    /// Generate two different identities.
    pub fn arb_identity_pair() -> impl Strategy<Value = (Identity, Identity)> {
        (arb_identity(), arb_identity()).prop_filter("identities must differ", |(a, b)| a != b)
    }

    pub fn arb_priority() -> impl Strategy<Value = Priority> {
        prop::sample::select(Priority::ALL.to_vec())
    }

    pub fn arb_status() -> impl Strategy<Value = Status> {
        prop::sample::select(Status::ALL.to_vec())
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default()
        })
    }

    /// Generate a draft that passes validation.
    pub fn arb_task_draft() -> impl Strategy<Value = TaskDraft> {
        (
            "[A-Za-z][A-Za-z ]{4,40}",
            prop::option::of("[a-z ]{0,60}"),
            prop::option::of(arb_timestamp()),
            arb_priority(),
            arb_status(),
        )
            .prop_map(|(title, description, due_date, priority, status)| TaskDraft {
                title,
                description,
                due_date,
                priority,
                status,
            })
    }

    /// Generate any cacheable listing query.
    pub fn arb_query() -> impl Strategy<Value = TaskQuery> {
        prop_oneof![
            Just(TaskQuery::ListAll),
            arb_status().prop_map(TaskQuery::ByStatus),
            arb_priority().prop_map(TaskQuery::ByPriority),
            "[a-zA-Z]{1,8}".prop_map(|text| TaskQuery::search_title(&text)),
        ]
    }

    /// Generate a bearer token signing key.
    pub fn arb_signing_key() -> impl Strategy<Value = String> {
        "[A-Za-z0-9]{16,48}"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common test scenarios.

    use super::*;

    /// Parse a fixture identity. Panics on a blank value.
    #[track_caller]
    pub fn identity(raw: &str) -> Identity {
        match Identity::parse(raw) {
            Some(identity) => identity,
            None => panic!("fixture identity must be non-blank: {:?}", raw),
        }
    }

    pub fn alice() -> Identity {
        identity("alice-id")
    }

    pub fn bob() -> Identity {
        identity("bob-id")
    }

    /// A task set spanning every status and several priorities.
    pub fn sprint_drafts() -> Vec<TaskDraft> {
        vec![
            TaskDraft::new("Plan the sprint")
                .with_status(Status::Todo)
                .with_priority(Priority::High),
            TaskDraft::new("Ship the release")
                .with_status(Status::InProgress)
                .with_priority(Priority::Critical),
            TaskDraft::new("Write release notes")
                .with_status(Status::Done)
                .with_priority(Priority::Low),
            TaskDraft::new("Migrate the legacy importer")
                .with_status(Status::Cancelled)
                .with_priority(Priority::Medium),
        ]
    }

    /// Create and commit `drafts` for `owner`.
    pub async fn seed_store<S: TaskStore + ?Sized>(
        store: &S,
        owner: &Identity,
        drafts: &[TaskDraft],
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            created.push(store.create(draft, owner).await?);
        }
        store.commit().await?;
        Ok(created)
    }
}
