//! Request Authorizer
//!
//! Turns an `Authorization` header into an explicit identity outcome. A token
//! that fails validation is an authentication failure. A token that validates
//! but carries no subject produces [`IdentityOutcome::Missing`], which data
//! operations map to an authorization failure instead of scoping work to a
//! default user.

use crate::auth::{Claims, TokenService};
use crate::error::{ApiError, ApiResult};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tasktrack_core::{ConfigError, Identity};

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of extracting the identity claim from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    Identity(Identity),
    Missing,
}

impl IdentityOutcome {
    pub fn from_claims(claims: &Claims) -> Self {
        match claims.identity() {
            Some(identity) => IdentityOutcome::Identity(identity),
            None => IdentityOutcome::Missing,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityOutcome::Identity(identity) => Some(identity),
            IdentityOutcome::Missing => None,
        }
    }

    /// Require an identity, mapping `Missing` through `policy`.
    pub fn require(self, policy: MissingIdentityPolicy) -> ApiResult<Identity> {
        match self {
            IdentityOutcome::Identity(identity) => Ok(identity),
            IdentityOutcome::Missing => Err(ApiError::identity_missing(policy.status_code())),
        }
    }
}

/// How a missing identity is reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingIdentityPolicy {
    /// 404 "User not found".
    #[default]
    NotFound,
    /// 403.
    Forbidden,
}

impl MissingIdentityPolicy {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MissingIdentityPolicy::NotFound => StatusCode::NOT_FOUND,
            MissingIdentityPolicy::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MissingIdentityPolicy::NotFound => "not_found",
            MissingIdentityPolicy::Forbidden => "forbidden",
        }
    }
}

impl FromStr for MissingIdentityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not_found" | "404" => Ok(MissingIdentityPolicy::NotFound),
            "forbidden" | "403" => Ok(MissingIdentityPolicy::Forbidden),
            other => Err(ConfigError::InvalidValue {
                field: "missing_identity_status".to_string(),
                value: other.to_string(),
                reason: "expected not_found or forbidden".to_string(),
            }),
        }
    }
}

impl fmt::Display for MissingIdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub outcome: IdentityOutcome,
    pub name: String,
    pub email: String,
}

impl Principal {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            outcome: IdentityOutcome::from_claims(&claims),
            name: claims.name,
            email: claims.email,
        }
    }
}

// ============================================================================
// AUTHORIZER
// ============================================================================

/// Extract the token from a `Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Validates bearer headers through the [`TokenService`].
#[derive(Debug, Clone)]
pub struct RequestAuthorizer {
    tokens: Arc<TokenService>,
    missing_identity: MissingIdentityPolicy,
}

impl RequestAuthorizer {
    pub fn new(tokens: Arc<TokenService>, missing_identity: MissingIdentityPolicy) -> Self {
        Self {
            tokens,
            missing_identity,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn missing_identity_policy(&self) -> MissingIdentityPolicy {
        self.missing_identity
    }

    /// Authenticate a request from its `Authorization` header.
    ///
    /// Fails with 401 when the header is absent, is not a bearer credential,
    /// or carries a token that does not validate. Succeeds with a
    /// [`Principal`] whose outcome may still be [`IdentityOutcome::Missing`].
    pub fn authorize(&self, authorization: Option<&str>) -> ApiResult<Principal> {
        let header_value = authorization.ok_or_else(|| {
            ApiError::unauthorized("Authentication required: provide Authorization header")
        })?;

        let token = bearer_token(header_value).ok_or_else(|| {
            ApiError::invalid_token("Authorization header must use Bearer scheme")
        })?;

        let claims = self.tokens.validate(token).map_err(|e| {
            tracing::warn!(error = %e, "Token validation failed");
            ApiError::from(e)
        })?;

        let principal = Principal::from_claims(claims);
        if principal.outcome == IdentityOutcome::Missing {
            tracing::warn!("Validated token carries no identity claim");
        }
        Ok(principal)
    }
}
