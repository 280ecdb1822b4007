//! Async task store trait.
//!
//! Every identity-scoped call filters by the identity it is given. Callers
//! pass the authenticated identity, never one supplied by the client.

use ::async_trait::async_trait;
use tasktrack_core::{
    Identity, Priority, Status, TaskDraft, TaskId, TaskQuery, TaskRecord, TaskTrackResult,
};

/// Persistence capability for task records.
///
/// Writes (`create`, `update`, `delete`) may be staged by the implementation
/// and only become durable on [`TaskStore::commit`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    // ========================================================================
    // READS
    // ========================================================================

    /// All tasks owned by `identity`, in listing order.
    async fn list(&self, identity: &Identity) -> TaskTrackResult<Vec<TaskRecord>>;

    /// One task, or `None` if it does not exist or belongs to someone else.
    async fn get(&self, id: TaskId, identity: &Identity) -> TaskTrackResult<Option<TaskRecord>>;

    async fn filter_by_status(
        &self,
        status: Status,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>>;

    async fn filter_by_priority(
        &self,
        priority: Priority,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>>;

    /// Case-insensitive substring search. `text` is expected lower-cased.
    async fn search_by_title(
        &self,
        text: &str,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Stage a new task owned by `identity` and return it with its id.
    async fn create(&self, draft: &TaskDraft, identity: &Identity) -> TaskTrackResult<TaskRecord>;

    /// Stage an update. Returns `false` if the task is absent or not owned.
    async fn update(
        &self,
        id: TaskId,
        draft: &TaskDraft,
        identity: &Identity,
    ) -> TaskTrackResult<bool>;

    /// Stage a removal. Returns `false` if the task is absent or not owned.
    async fn delete(&self, id: TaskId, identity: &Identity) -> TaskTrackResult<bool>;

    /// Make staged writes durable.
    async fn commit(&self) -> TaskTrackResult<()>;

    // ========================================================================
    // PROVIDED
    // ========================================================================

    /// Dispatch a cacheable read query to the matching store call.
    async fn run_query(
        &self,
        query: &TaskQuery,
        identity: &Identity,
    ) -> TaskTrackResult<Vec<TaskRecord>> {
        match query {
            TaskQuery::ListAll => self.list(identity).await,
            TaskQuery::ByStatus(status) => self.filter_by_status(*status, identity).await,
            TaskQuery::ByPriority(priority) => self.filter_by_priority(*priority, identity).await,
            TaskQuery::SearchTitle(text) => self.search_by_title(text, identity).await,
        }
    }
}
