//! Middleware modules for the TaskTrack API
//!
//! - `auth`: bearer token validation and the [`AuthIdentity`] extractor
//! - `admission`: per-identity and anonymous admission limiting
//!
//! # Middleware Order
//!
//! Admission needs the principal produced by auth, so auth is the outer
//! layer:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/tasks", get(handler))
//!     // Innermost (runs last on request)
//!     .layer(middleware::from_fn_with_state(limiter, admission_middleware))
//!     // Outermost
//!     .layer(middleware::from_fn_with_state(authorizer, auth_middleware))
//! ```

mod admission;
mod auth;

pub use admission::{admission_middleware, caller_for};
pub use auth::{auth_middleware, AuthIdentity};
