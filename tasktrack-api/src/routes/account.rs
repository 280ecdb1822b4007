//! Account REST API Routes
//!
//! Registration and login. Both are unauthenticated and are not subject to
//! admission control.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};

use crate::{
    error::ApiResult,
    state::AppState,
    types::{LoginRequest, RegisterRequest, RegisterResponse},
};

/// POST /api/account/register - Create a user account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let account = state.accounts.register(&req).await?;

    let response = RegisterResponse {
        user_id: account.id.into_inner(),
        user_name: account.user_name,
        message: "User registered successfully".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/account/login - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = state.accounts.login(&req).await?;
    Ok(Json(response))
}

/// Account routes, relative to `/api/account`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}
