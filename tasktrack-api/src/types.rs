//! API Request and Response Types

use serde::{Deserialize, Serialize};
use tasktrack_core::{PageRequest, Priority, Status, TaskDraft, TaskId, TaskRecord, Timestamp, ValidationError};

use crate::identity_provider::UserAccount;

// ============================================================================
// TASK TYPES
// ============================================================================

/// Task as returned to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<Timestamp>,
    pub priority: Priority,
    pub status: Status,
}

impl From<&TaskRecord> for TaskResponse {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            description: record.description.clone(),
            due_date: record.due_date,
            priority: record.priority,
            status: record.status,
        }
    }
}

impl From<TaskRecord> for TaskResponse {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            due_date: record.due_date,
            priority: record.priority,
            status: record.status,
        }
    }
}

/// Request to create a task. Any client-supplied id is ignored.
pub type CreateTaskRequest = TaskDraft;

/// Request to replace a task. `id` must match the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub id: TaskId,
    #[serde(flatten)]
    pub task: TaskDraft,
}

/// One page of a task listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<TaskResponse>,
    pub page_number: u32,
    pub page_size: u32,
    /// Size of the full result set before paging.
    pub total: usize,
}

impl TaskPage {
    pub fn from_records(records: &[TaskRecord], page: PageRequest) -> Self {
        Self {
            tasks: page.apply(records).into_iter().map(TaskResponse::from).collect(),
            page_number: page.page_number(),
            page_size: page.page_size(),
            total: records.len(),
        }
    }
}

/// `?pageNumber=&pageSize=` query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageParams {
    pub fn to_page_request(self) -> Result<PageRequest, ValidationError> {
        PageRequest::new(self.page_number, self.page_size)
    }
}

// ============================================================================
// ACCOUNT TYPES
// ============================================================================

/// Request to register a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request to log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
}

/// Successful login: a bearer token plus the account it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub user_name: String,
    pub email: String,
}

/// Successful registration.
/// Caller's own account, as returned by `GET /api/user/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub user_name: String,
    pub email: String,
}

impl From<UserAccount> for ProfileResponse {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id.into_inner(),
            user_name: account.user_name,
            email: account.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNameRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub user_name: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasktrack_core::Identity;

    fn record(id: i64) -> TaskRecord {
        TaskRecord::from_draft(
            TaskId::new(id),
            TaskDraft::new(format!("task number {}", id)),
            Identity::parse("owner").expect("valid identity"),
        )
    }

    #[test]
    fn test_task_page_slices_after_full_set() -> Result<(), ValidationError> {
        let records: Vec<TaskRecord> = (1..=12).map(record).collect();
        let page = TaskPage::from_records(&records, PageRequest::new(Some(3), Some(5))?);

        assert_eq!(page.total, 12);
        assert_eq!(page.tasks.len(), 2);
        assert_eq!(page.tasks[0].id, TaskId::new(11));
        Ok(())
    }

    #[test]
    fn test_update_request_flattens_draft() -> Result<(), serde_json::Error> {
        let body = serde_json::json!({
            "id": 4,
            "title": "Write the report",
            "priority": 2,
            "status": 1
        });
        let parsed: UpdateTaskRequest = serde_json::from_value(body)?;
        assert_eq!(parsed.id, TaskId::new(4));
        assert_eq!(parsed.task.title, "Write the report");
        assert_eq!(parsed.task.priority, Priority::High);
        assert_eq!(parsed.task.status, Status::InProgress);
        Ok(())
    }

    #[test]
    fn test_page_params_use_camel_case() -> Result<(), serde_json::Error> {
        let params: PageParams = serde_json::from_value(serde_json::json!({ "pageNumber": 2 }))?;
        assert_eq!(params.page_number, Some(2));
        assert_eq!(params.page_size, None);
        Ok(())
    }

    #[test]
    fn test_task_response_hides_owner() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(TaskResponse::from(record(1)))?;
        assert!(json.get("owner").is_none());
        Ok(())
    }
}
