//! TaskTrack API - Authentication, Admission Control and REST Layer
//!
//! Issues and validates bearer tokens, turns validated claims into an
//! explicit identity outcome, limits request admission per identity, and
//! serves identity-scoped task operations through a cached service layer.
//!
//! All shared structures (query cache, limiter, token service) are built in
//! [`AppState`] and handed to the router; nothing lives in a global.

pub mod auth;
pub mod authorizer;
pub mod config;
pub mod error;
pub mod identity_provider;
pub mod limiter;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{Claims, JwtClock, JwtSecret, SystemClock, TokenConfig, TokenError, TokenService};
pub use authorizer::{IdentityOutcome, MissingIdentityPolicy, Principal, RequestAuthorizer};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use identity_provider::{AccountError, IdentityProvider, InMemoryIdentityProvider, UserAccount};
pub use limiter::{Admission, AdmissionLimiter, Caller, LimiterConfig, LimiterStats};
pub use middleware::{admission_middleware, auth_middleware, AuthIdentity};
pub use routes::create_api_router;
pub use services::{AccountService, TaskService};
pub use state::AppState;
pub use types::*;
