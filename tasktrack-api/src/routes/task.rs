//! Task REST API Routes
//!
//! Thin handlers over [`TaskService`](crate::services::TaskService). Every
//! route runs behind the auth and admission middleware and takes the caller's
//! identity from [`AuthIdentity`]; client-supplied owners are never trusted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tasktrack_core::{Priority, Status, TaskId};

use crate::{
    error::ApiResult,
    middleware::AuthIdentity,
    state::AppState,
    types::{CreateTaskRequest, PageParams, TaskPage, TaskResponse, UpdateTaskRequest},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/tasks - List the caller's tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.to_page_request()?;
    let tasks = state.tasks.list_all(&identity).await?;
    Ok(Json(TaskPage::from_records(&tasks, page)))
}

/// GET /api/tasks/:id - Get one task
pub async fn get_task(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Path(id): Path<TaskId>,
) -> ApiResult<impl IntoResponse> {
    let task = state.tasks.get(&identity, id).await?;
    Ok(Json(TaskResponse::from(task)))
}

/// POST /api/tasks - Create a task
pub async fn create_task(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let task = state.tasks.create(&identity, &req).await?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// PUT /api/tasks/:id - Replace a task
pub async fn update_task(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Path(id): Path<TaskId>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<StatusCode> {
    state.tasks.update(&identity, id, req.id, &req.task).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/tasks/:id - Delete a task
pub async fn delete_task(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Path(id): Path<TaskId>,
) -> ApiResult<StatusCode> {
    state.tasks.delete(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/tasks/filter/status/:n - Tasks with status ordinal `n`
pub async fn filter_by_status(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Path(ordinal): Path<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let status = Status::parse_ordinal(ordinal)?;
    let page = params.to_page_request()?;
    let tasks = state.tasks.list_by_status(&identity, status).await?;
    Ok(Json(TaskPage::from_records(&tasks, page)))
}

/// GET /api/tasks/filter/priority/:n - Tasks with priority ordinal `n`
pub async fn filter_by_priority(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Path(ordinal): Path<i64>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let priority = Priority::parse_ordinal(ordinal)?;
    let page = params.to_page_request()?;
    let tasks = state.tasks.list_by_priority(&identity, priority).await?;
    Ok(Json(TaskPage::from_records(&tasks, page)))
}

/// GET /api/tasks/search/:title - Case-insensitive title search
pub async fn search_tasks(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Path(title): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let page = params.to_page_request()?;
    let tasks = state.tasks.search_by_title(&identity, &title).await?;
    Ok(Json(TaskPage::from_records(&tasks, page)))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Task routes, relative to `/api/tasks`. Middleware is applied by the caller.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/filter/status/:n", get(filter_by_status))
        .route("/filter/priority/:n", get(filter_by_priority))
        .route("/search/:title", get(search_tasks))
}
