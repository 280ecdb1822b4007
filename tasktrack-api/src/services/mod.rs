//! Service Layer
//!
//! Business logic between the HTTP handlers and the store, cache and
//! identity provider. Handlers stay thin; everything they do is reachable
//! here without an HTTP request.

mod account_service;
mod task_service;

pub use account_service::*;
pub use task_service::*;
