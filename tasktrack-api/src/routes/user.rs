//! User Profile REST API Routes
//!
//! The caller's own account: read it, rename it, change its email or
//! password. Runs behind auth and admission like the task routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use crate::{
    error::ApiResult,
    middleware::AuthIdentity,
    state::AppState,
    types::{ChangeNameRequest, ChangePasswordRequest, ProfileResponse},
};

/// GET /api/user/profile - The caller's account
pub async fn get_profile(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
) -> ApiResult<impl IntoResponse> {
    let account = state.accounts.profile(&identity).await?;
    Ok(Json(ProfileResponse::from(account)))
}

/// PUT /api/user/change-name - Rename the caller's account
pub async fn change_name(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Json(req): Json<ChangeNameRequest>,
) -> ApiResult<StatusCode> {
    state.accounts.change_name(&identity, &req).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/user/change-email/:email - Replace the caller's email
pub async fn change_email(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Path(email): Path<String>,
) -> ApiResult<StatusCode> {
    state.accounts.change_email(&identity, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/user/reset-password - Change password, given the current one
pub async fn reset_password(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    state.accounts.change_password(&identity, &req).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// User routes, relative to `/api/user`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/change-name", put(change_name))
        .route("/change-email/:email", put(change_email))
        .route("/reset-password", put(reset_password))
}
