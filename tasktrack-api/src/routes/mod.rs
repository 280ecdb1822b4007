//! REST API Routes Module
//!
//! - Task CRUD, filter and search routes (auth, then admission)
//! - User profile routes (auth, then admission)
//! - Account register and login (no admission control)
//! - Health and counters (no middleware)
//! - CORS support for browser-based clients

pub mod account;
pub mod health;
pub mod task;
pub mod user;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::middleware::{admission_middleware, auth_middleware};
use crate::state::AppState;

pub use account::create_router as account_router;
pub use health::create_router as health_router;
pub use task::create_router as task_router;
pub use user::create_router as user_router;

const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

// ============================================================================
// ROUTER
// ============================================================================

/// Build the complete router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS (outermost) - handles preflight requests
/// 2. Trace - request spans
/// 3. Auth (task and user routes) - validates the bearer token
/// 4. Admission (task and user routes) - per-identity or anonymous budget
///
/// Register and login are never throttled; a shared anonymous window in
/// front of them would let any client lock everyone out of logging in.
pub fn create_api_router(state: AppState) -> Router {
    let task_routes = task::create_router()
        .layer(from_fn_with_state(state.limiter.clone(), admission_middleware))
        .layer(from_fn_with_state(state.authorizer.clone(), auth_middleware));

    let user_routes = user::create_router()
        .layer(from_fn_with_state(state.limiter.clone(), admission_middleware))
        .layer(from_fn_with_state(state.authorizer.clone(), auth_middleware));

    let account_routes = account::create_router();

    let cors = build_cors_layer(&state.config);

    Router::new()
        .nest("/api/tasks", task_routes)
        .nest("/api/user", user_routes)
        .nest("/api/account", account_routes)
        .nest("/health", health::create_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// Empty origins allow any origin; otherwise only the configured ones.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            header::RETRY_AFTER,
        ])
        .max_age(CORS_MAX_AGE);

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricting origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}
