//! Shared application state.
//!
//! Every shared structure (cache, limiter, token service) is constructed
//! here and passed down explicitly. Nothing is reached through a global.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use tasktrack_storage::{QueryCache, TaskStore};

use crate::auth::TokenService;
use crate::authorizer::{MissingIdentityPolicy, RequestAuthorizer};
use crate::config::ApiConfig;
use crate::identity_provider::IdentityProvider;
use crate::limiter::AdmissionLimiter;
use crate::services::{AccountService, TaskService};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub tasks: TaskService,
    pub accounts: AccountService,
    pub authorizer: RequestAuthorizer,
    pub limiter: Arc<AdmissionLimiter>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn TaskStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(config.token.clone()));
        Self::with_tokens(config, store, provider, tokens)
    }

    /// Build state around an existing token service (for a custom clock).
    pub fn with_tokens(
        config: ApiConfig,
        store: Arc<dyn TaskStore>,
        provider: Arc<dyn IdentityProvider>,
        tokens: Arc<TokenService>,
    ) -> Self {
        let cache = Arc::new(QueryCache::new(config.cache.clone()));
        let limiter = Arc::new(AdmissionLimiter::new(config.limiter.clone()));

        Self {
            tasks: TaskService::new(store, cache),
            accounts: AccountService::new(provider, Arc::clone(&tokens)),
            authorizer: RequestAuthorizer::new(tokens, config.missing_identity),
            limiter,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

impl FromRef<AppState> for MissingIdentityPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.authorizer.missing_identity_policy()
    }
}
