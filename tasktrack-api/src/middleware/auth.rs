//! Axum Middleware for Authentication
//!
//! `auth_middleware` validates the bearer token through the
//! [`RequestAuthorizer`] and injects the resulting [`Principal`] into request
//! extensions. Handlers take [`AuthIdentity`], which turns a missing identity
//! into the configured authorization failure.

use crate::authorizer::{MissingIdentityPolicy, Principal, RequestAuthorizer};
use crate::error::ApiError;
use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tasktrack_core::Identity;

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for authentication.
///
/// Returns 401 if the `Authorization` header is absent or its token fails
/// validation. A token without an identity claim still passes; the handler
/// decides what that means.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use tasktrack_api::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/api/tasks", axum::routing::get(|| async { "OK" }))
///     .layer(middleware::from_fn_with_state(authorizer, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(authorizer): State<RequestAuthorizer>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let principal = authorizer.authorize(auth_header)?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the caller's identity.
///
/// Fails with the missing-identity policy's status when the token had no
/// identity claim, and with 500 if `auth_middleware` is not applied to the
/// route.
#[derive(Debug, Clone)]
pub struct AuthIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthIdentity
where
    S: Send + Sync,
    MissingIdentityPolicy: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().ok_or_else(|| {
            ApiError::internal_error(
                "Principal not found in request extensions. \
                 Ensure auth_middleware is applied to this route.",
            )
        })?;

        principal
            .outcome
            .clone()
            .require(MissingIdentityPolicy::from_ref(state))
            .map(AuthIdentity)
    }
}
