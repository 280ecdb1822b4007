//! Health Check Endpoints
//!
//! - /health/live - Process alive check
//! - /health/stats - Query cache and admission limiter counters
//!
//! No authentication or admission control on health endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tasktrack_storage::CacheStats;

use crate::limiter::LimiterStats;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Liveness response. A process that can answer is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
}

/// Counters exposed by /health/stats.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    pub limiter: LimiterStats,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/live - Process liveness check
pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "alive".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/stats - Cache and limiter counters
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.tasks.cache().stats();
    let response = StatsResponse {
        cache_hit_rate: cache.hit_rate(),
        cache,
        limiter: state.limiter.stats(),
    };
    (StatusCode::OK, Json(response))
}

/// Health routes, relative to `/health`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/live", get(liveness))
        .route("/stats", get(stats))
}
