//! TaskTrack API Server Entry Point
//!
//! Loads configuration from the environment, installs tracing, and starts
//! the Axum HTTP server over the in-memory task store.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tasktrack_api::telemetry::init_tracing;
use tasktrack_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, InMemoryIdentityProvider};
use tasktrack_storage::InMemoryTaskStore;

#[tokio::main]
async fn main() -> ApiResult<()> {
    // A missing signing key stops startup here.
    let config = ApiConfig::from_env()?;
    init_tracing(config.log_format)?;

    let addr = resolve_bind_addr(&config)?;
    let sweep_interval = config.cache.sweep_interval;

    let state = AppState::new(
        config,
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(InMemoryIdentityProvider::new()),
    );

    let sweeper = sweep_interval.map(|interval| {
        tracing::info!(interval_secs = interval.as_secs(), "Starting cache sweeper");
        state.tasks.cache().spawn_sweeper(interval)
    });

    let app: Router = create_api_router(state);

    tracing::info!(%addr, "Starting TaskTrack API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}

fn resolve_bind_addr(config: &ApiConfig) -> ApiResult<SocketAddr> {
    let addr = config.bind_addr();
    addr.parse::<SocketAddr>().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
    })
}
