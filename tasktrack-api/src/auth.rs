//! Token Service
//!
//! Issues and validates the signed bearer tokens that establish request
//! identity. Tokens are HS256 JWTs carrying the subject identity, display
//! name and email, issuer, audience, issued-at and expiry. They are
//! stateless; there is no server-side revocation list.
//!
//! Time checks are done here against an injected [`JwtClock`] rather than
//! inside `jsonwebtoken`, so tests are deterministic and a broken system
//! clock fails loudly instead of panicking.

use crate::error::ApiError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tasktrack_core::Identity;
use thiserror::Error;

/// Default `iss` claim.
pub const DEFAULT_ISSUER: &str = "tasktrack";

/// Default `aud` claim.
pub const DEFAULT_AUDIENCE: &str = "tasktrack-clients";

/// Default token lifetime: one day.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Largest accepted expiry leeway: one hour.
pub const MAX_LEEWAY_SECS: i64 = 60 * 60;

// ============================================================================
// CLOCK ABSTRACTION (FOR DETERMINISTIC TESTS + CI ROBUSTNESS)
// ============================================================================

/// Clock abstraction for JWT time validation.
pub trait JwtClock: Send + Sync {
    /// Get current time as Unix epoch seconds.
    ///
    /// Returns negative values for pre-1970 times, which validation treats
    /// as a server fault.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// ERRORS
// ============================================================================

/// Token issuance and validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Signing key is missing or empty")]
    MissingSigningKey,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token issuer does not match")]
    IssuerMismatch,

    #[error("Token audience does not match")]
    AudienceMismatch,

    #[error("Token is malformed: {0}")]
    Malformed(String),

    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error("Server clock returned pre-epoch time {now}")]
    InvalidClock { now: i64 },

    #[error("Offset of {offset}s from {now} is out of range")]
    TimeOverflow { now: i64, offset: i64 },
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::token_expired(),
            TokenError::InvalidSignature
            | TokenError::IssuerMismatch
            | TokenError::AudienceMismatch
            | TokenError::Malformed(_) => ApiError::invalid_token(err.to_string()),
            TokenError::MissingSigningKey | TokenError::Encoding(_) => {
                tracing::error!(error = %err, "Token service misconfigured");
                ApiError::internal_error("Failed to issue token")
            }
            TokenError::TimeOverflow { now, offset } => {
                tracing::error!(timestamp = now, offset, "Token time arithmetic overflowed");
                ApiError::internal_error("Token lifetime configuration error")
            }
            TokenError::InvalidClock { now } => {
                tracing::error!(timestamp = now, "System clock returned pre-epoch time");
                ApiError::internal_error("Server time configuration error - please contact support")
            }
        }
    }
}

// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// Type-safe JWT signing key that prevents accidental logging.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Create a new signing key.
    ///
    /// # Errors
    /// Returns [`TokenError::MissingSigningKey`] if the key is empty or blank.
    pub fn new(secret: impl Into<String>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(TokenError::MissingSigningKey);
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (use sparingly, only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Get the length of the secret without exposing it.
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    /// Check if the secret is empty without exposing it.
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Token service configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Shared HMAC signing key.
    pub secret: JwtSecret,

    /// Issued and expected `iss`.
    pub issuer: String,

    /// Issued and expected `aud`.
    pub audience: String,

    /// Lifetime of issued tokens in seconds (default: one day).
    pub lifetime_secs: i64,

    /// Clock skew tolerance applied to the expiry check.
    pub leeway_secs: i64,
}

impl TokenConfig {
    /// Configuration with default issuer, audience and lifetime.
    pub fn new(secret: JwtSecret) -> Self {
        Self {
            secret,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            leeway_secs: 0,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_lifetime_secs(mut self, secs: i64) -> Self {
        self.lifetime_secs = secs;
        self
    }

    pub fn with_leeway_secs(mut self, secs: i64) -> Self {
        self.leeway_secs = secs;
        self
    }
}

// ============================================================================
// CLAIMS
// ============================================================================

/// JWT claims carried by a TaskTrack token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user identity). May be absent on foreign tokens.
    #[serde(default)]
    pub sub: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Email address
    #[serde(default)]
    pub email: String,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Audience
    #[serde(default)]
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims for a user using a clock.
    ///
    /// # Errors
    /// [`TokenError::TimeOverflow`] when the expiry does not fit in an `i64`.
    pub fn new(
        identity: &Identity,
        name: impl Into<String>,
        email: impl Into<String>,
        config: &TokenConfig,
        clock: &dyn JwtClock,
    ) -> Result<Self, TokenError> {
        let now = clock.now_epoch_secs();
        let exp = now
            .checked_add(config.lifetime_secs)
            .ok_or(TokenError::TimeOverflow {
                now,
                offset: config.lifetime_secs,
            })?;

        Ok(Self {
            sub: identity.as_str().to_string(),
            name: name.into(),
            email: email.into(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            iat: now,
            exp,
        })
    }

    /// The subject as an [`Identity`], or `None` when absent or blank.
    pub fn identity(&self) -> Option<Identity> {
        Identity::parse(self.sub.as_str())
    }
}

// ============================================================================
// TOKEN SERVICE
// ============================================================================

/// Issues and validates bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    clock: Arc<dyn JwtClock>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    /// Create a token service on the system clock.
    pub fn new(config: TokenConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a token service with an explicit clock.
    pub fn with_clock(config: TokenConfig, clock: Arc<dyn JwtClock>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.expose().as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.expose().as_bytes());
        Self {
            config,
            clock,
            encoding_key,
            decoding_key,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a signed token for `identity`, valid for the configured lifetime.
    pub fn issue(
        &self,
        identity: &Identity,
        display_name: &str,
        email: &str,
    ) -> Result<String, TokenError> {
        if self.config.secret.is_empty() {
            return Err(TokenError::MissingSigningKey);
        }

        let claims = Claims::new(identity, display_name, email, &self.config, &*self.clock)?;
        let header = Header::new(Algorithm::HS256);

        encode(&header, &claims, &self.encoding_key).map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Validate `token` and return its claims.
    ///
    /// Checks, in order: signature, expiry (with leeway), issuer, audience.
    /// A valid token may still lack a subject; callers turn that into a
    /// missing-identity outcome via [`Claims::identity`].
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        // Decode with signature validation ONLY; time, issuer and audience are checked below
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;

        let now = self.clock.now_epoch_secs();
        if now < 0 {
            return Err(TokenError::InvalidClock { now });
        }

        // Expiry: allow slightly-in-the-past within leeway
        let leeway = self.config.leeway_secs;
        let earliest = now
            .checked_sub(leeway)
            .ok_or(TokenError::TimeOverflow { now, offset: leeway })?;
        if claims.exp < earliest {
            return Err(TokenError::Expired);
        }

        if claims.iss != self.config.issuer {
            return Err(TokenError::IssuerMismatch);
        }

        if claims.aud != self.config.audience {
            return Err(TokenError::AudienceMismatch);
        }

        Ok(claims)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(raw: &str) -> Identity {
        Identity::parse(raw).expect("valid identity")
    }

    fn test_config(secret: &str) -> TokenConfig {
        TokenConfig::new(JwtSecret::new(secret).expect("test secret should be valid"))
    }

    fn service_at(config: TokenConfig, clock: FixedClock) -> TokenService {
        TokenService::with_clock(config, Arc::new(clock))
    }

    #[test]
    fn test_issue_and_validate_roundtrip() -> Result<(), TokenError> {
        let service = service_at(test_config("k1"), test_clocks::valid());

        let token = service.issue(&ident("user-1"), "alice", "alice@example.com")?;
        let claims = service.validate(&token)?;

        assert_eq!(claims.identity(), Some(ident("user-1")));
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.aud, DEFAULT_AUDIENCE);
        assert_eq!(claims.exp - claims.iat, DEFAULT_TOKEN_LIFETIME_SECS);
        Ok(())
    }

    #[test]
    fn test_wrong_key_is_invalid_signature() -> Result<(), TokenError> {
        let issuer = service_at(test_config("k1"), test_clocks::valid());
        let verifier = service_at(test_config("k2"), test_clocks::valid());

        let token = issuer.issue(&ident("user-1"), "alice", "a@example.com")?;
        assert_eq!(verifier.validate(&token), Err(TokenError::InvalidSignature));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> Result<(), TokenError> {
        let issuer = service_at(test_config("k1"), test_clocks::expired());
        let verifier = service_at(test_config("k1"), test_clocks::valid());

        let token = issuer.issue(&ident("user-1"), "alice", "a@example.com")?;
        assert_eq!(verifier.validate(&token), Err(TokenError::Expired));
        Ok(())
    }

    #[test]
    fn test_expiry_boundary_and_leeway() -> Result<(), TokenError> {
        let config = test_config("k1").with_lifetime_secs(60);
        let issued_at = test_clocks::valid().0;
        let token = service_at(config.clone(), FixedClock(issued_at)).issue(&ident("u"), "n", "e")?;

        // exactly at exp is still valid
        assert!(service_at(config.clone(), FixedClock(issued_at + 60)).validate(&token).is_ok());
        assert_eq!(
            service_at(config.clone(), FixedClock(issued_at + 61)).validate(&token),
            Err(TokenError::Expired)
        );

        let lenient = config.with_leeway_secs(30);
        assert!(service_at(lenient.clone(), FixedClock(issued_at + 90)).validate(&token).is_ok());
        assert_eq!(
            service_at(lenient, FixedClock(issued_at + 91)).validate(&token),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn test_lifetime_overflow_is_an_error() {
        let config = test_config("k1").with_lifetime_secs(i64::MAX);
        let service = service_at(config, test_clocks::valid());

        let err = service.issue(&ident("u"), "n", "e").err();
        assert_eq!(
            err,
            Some(TokenError::TimeOverflow {
                now: test_clocks::valid().0,
                offset: i64::MAX,
            })
        );
        let api = ApiError::from(TokenError::TimeOverflow { now: 0, offset: i64::MAX });
        assert_eq!(api.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_leeway_underflow_is_an_error() -> Result<(), TokenError> {
        let token = service_at(test_config("k1"), test_clocks::valid()).issue(&ident("u"), "n", "e")?;
        let broken = service_at(test_config("k1").with_leeway_secs(i64::MIN), test_clocks::valid());
        assert!(matches!(broken.validate(&token), Err(TokenError::TimeOverflow { .. })));
        Ok(())
    }

    #[test]
    fn test_issuer_and_audience_mismatch() -> Result<(), TokenError> {
        let token = service_at(test_config("k1"), test_clocks::valid()).issue(&ident("u"), "n", "e")?;

        let other_issuer = service_at(test_config("k1").with_issuer("someone-else"), test_clocks::valid());
        assert_eq!(other_issuer.validate(&token), Err(TokenError::IssuerMismatch));

        let other_audience = service_at(test_config("k1").with_audience("mobile"), test_clocks::valid());
        assert_eq!(other_audience.validate(&token), Err(TokenError::AudienceMismatch));
        Ok(())
    }

    #[test]
    fn test_token_without_subject_validates_but_has_no_identity() -> Result<(), TokenError> {
        let config = test_config("k1");
        let now = test_clocks::valid().0;
        let raw = serde_json::json!({
            "name": "ghost",
            "iss": DEFAULT_ISSUER,
            "aud": DEFAULT_AUDIENCE,
            "iat": now,
            "exp": now + 60,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &raw,
            &EncodingKey::from_secret(b"k1"),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

        let claims = service_at(config, test_clocks::valid()).validate(&token)?;
        assert_eq!(claims.name, "ghost");
        assert_eq!(claims.identity(), None);
        Ok(())
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let service = service_at(test_config("k1"), test_clocks::valid());
        assert!(matches!(service.validate("not-a-jwt"), Err(TokenError::Malformed(_))));
        assert!(matches!(service.validate(""), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_pre_epoch_clock_fails_loud() -> Result<(), TokenError> {
        let token = service_at(test_config("k1"), test_clocks::valid()).issue(&ident("u"), "n", "e")?;
        let broken = service_at(test_config("k1"), FixedClock(-1));
        assert_eq!(broken.validate(&token), Err(TokenError::InvalidClock { now: -1 }));
        Ok(())
    }

    #[test]
    fn test_empty_signing_key_rejected() {
        assert_eq!(JwtSecret::new("").err(), Some(TokenError::MissingSigningKey));
        assert_eq!(JwtSecret::new("   ").err(), Some(TokenError::MissingSigningKey));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = JwtSecret::new("super-secret-value").expect("valid secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));

        let service = TokenService::new(TokenConfig::new(secret));
        assert!(!format!("{:?}", service).contains("super-secret-value"));
    }

    #[test]
    fn test_token_errors_map_to_api_errors() {
        use crate::error::ErrorCode;

        assert_eq!(ApiError::from(TokenError::Expired).code, ErrorCode::TokenExpired);
        assert_eq!(ApiError::from(TokenError::InvalidSignature).code, ErrorCode::InvalidToken);
        assert_eq!(ApiError::from(TokenError::AudienceMismatch).code, ErrorCode::InvalidToken);
        assert_eq!(ApiError::from(TokenError::MissingSigningKey).code, ErrorCode::InternalError);
    }

    #[test]
    fn test_future_clock_sees_issued_token_as_expired() -> Result<(), TokenError> {
        let token = service_at(test_config("k1"), test_clocks::valid()).issue(&ident("u"), "n", "e")?;
        let later = service_at(test_config("k1"), test_clocks::future());
        assert_eq!(later.validate(&token), Err(TokenError::Expired));
        Ok(())
    }
}
