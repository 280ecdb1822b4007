//! Admission Middleware
//!
//! Runs the [`AdmissionLimiter`] in front of handlers. Requests carrying a
//! [`Principal`] with an identity draw from that identity's bucket; everything
//! else (no principal, or a token without an identity claim) shares the
//! anonymous window.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::authorizer::Principal;
use crate::error::ApiError;
use crate::limiter::{Admission, AdmissionLimiter, Caller};

const RATE_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// Classify the request's caller for the limiter.
pub fn caller_for(request: &Request) -> Caller {
    request
        .extensions()
        .get::<Principal>()
        .and_then(|principal| principal.outcome.identity().cloned())
        .map(Caller::Identified)
        .unwrap_or(Caller::Anonymous)
}

/// Admission limiting middleware.
///
/// Rejected requests get 429 with a `Retry-After` header and never reach the
/// handler. Allowed responses carry `x-ratelimit-limit`.
pub async fn admission_middleware(
    State(limiter): State<Arc<AdmissionLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !limiter.config().enabled {
        return Ok(next.run(request).await);
    }

    let caller = caller_for(&request);

    match limiter.admit(&caller) {
        Admission::Allowed => {
            let limit = match caller {
                Caller::Identified(_) => limiter.config().capacity,
                Caller::Anonymous => limiter.config().anonymous_permits,
            };

            let mut response = next.run(request).await;
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                response.headers_mut().insert(RATE_LIMIT_HEADER, value);
            }
            Ok(response)
        }
        rejected @ Admission::Rejected { .. } => {
            Err(ApiError::too_many_requests(rejected.retry_after_secs()))
        }
    }
}
