//! Property-Based Tests for Token Validation and Authentication Enforcement
//!
//! **Property 1: Issued Tokens Round-Trip**
//! A token issued for an identity validates under the same key and yields
//! that identity.
//!
//! **Property 2: Foreign Keys Are Rejected**
//! A token signed with one key fails validation under a different key with
//! `InvalidSignature`.
//!
//! **Property 3: Expiry Is Enforced**
//! Once the clock passes the expiry, validation fails with `Expired`.
//!
//! **Property 4: Authentication Enforcement**
//! A request without a valid bearer token never reaches the handler.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use proptest::prelude::*;
use tasktrack_api::{
    auth::FixedClock,
    middleware::{auth_middleware, AuthIdentity},
    JwtSecret, MissingIdentityPolicy, RequestAuthorizer, TokenConfig, TokenError, TokenService,
};
use tasktrack_test_utils::generators::{arb_identity, arb_signing_key};
use tower::ServiceExt;

const NOW: i64 = 1704067200;

// ============================================================================
// TEST HELPERS
// ============================================================================

fn service(key: &str, now: i64) -> TokenService {
    let config = TokenConfig::new(JwtSecret::new(key).expect("valid key"));
    TokenService::with_clock(config, Arc::new(FixedClock(now)))
}

fn test_app(tokens: TokenService) -> Router {
    let policy = MissingIdentityPolicy::NotFound;
    let authorizer = RequestAuthorizer::new(Arc::new(tokens), policy);

    Router::new()
        .route(
            "/api/tasks",
            get(|AuthIdentity(identity): AuthIdentity| async move { identity.into_inner() }),
        )
        .with_state(policy)
        .layer(middleware::from_fn_with_state(authorizer, auth_middleware))
}

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

#[derive(Debug, Clone)]
enum AuthHeader {
    /// Token signed with the server's key
    Valid,
    /// Token signed with some other key
    ForeignKey(String),
    /// Three dot-separated segments that are not a token
    Garbage(String),
    /// Not a bearer credential
    WrongScheme(String),
    /// No header at all
    None,
}

fn auth_header_strategy() -> impl Strategy<Value = AuthHeader> {
    prop_oneof![
        Just(AuthHeader::Valid),
        arb_signing_key().prop_map(AuthHeader::ForeignKey),
        "[A-Za-z0-9_-]{10,40}\\.[A-Za-z0-9_-]{10,40}\\.[A-Za-z0-9_-]{10,40}"
            .prop_map(AuthHeader::Garbage),
        "(Basic|Token|Digest) [A-Za-z0-9]{10,30}".prop_map(AuthHeader::WrongScheme),
        Just(AuthHeader::None),
    ]
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Issued Tokens Round-Trip**
    #[test]
    fn prop_issued_token_validates(identity in arb_identity(), key in arb_signing_key()) {
        let tokens = service(&key, NOW);
        let token = tokens.issue(&identity, "name", "name@example.com").expect("issue");
        let claims = tokens.validate(&token).expect("validate");
        prop_assert_eq!(claims.identity(), Some(identity));
        prop_assert_eq!(claims.exp, NOW + 24 * 60 * 60);
    }

    /// **Property 2: Foreign Keys Are Rejected**
    #[test]
    fn prop_foreign_key_is_rejected(
        identity in arb_identity(),
        k1 in arb_signing_key(),
        k2 in arb_signing_key(),
    ) {
        prop_assume!(k1 != k2);
        let token = service(&k1, NOW).issue(&identity, "n", "e").expect("issue");
        let result = service(&k2, NOW).validate(&token);
        prop_assert_eq!(result.err(), Some(TokenError::InvalidSignature));
    }

    /// **Property 3: Expiry Is Enforced**
    #[test]
    fn prop_expired_token_is_rejected(
        identity in arb_identity(),
        past_expiry in 1i64..1_000_000,
    ) {
        let key = "expiry-property-key";
        let token = service(key, NOW).issue(&identity, "n", "e").expect("issue");
        let later = NOW + 24 * 60 * 60 + past_expiry;
        let result = service(key, later).validate(&token);
        prop_assert_eq!(result.err(), Some(TokenError::Expired));
    }

    /// **Property 4: Authentication Enforcement**
    #[test]
    fn prop_authentication_enforcement(
        header in auth_header_strategy(),
        identity in arb_identity(),
    ) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let server_key = "server-signing-key";
            let app = test_app(service(server_key, NOW));

            let mut builder = Request::builder().uri("/api/tasks");
            let expect_ok = match &header {
                AuthHeader::Valid => {
                    let token = service(server_key, NOW)
                        .issue(&identity, "n", "e")
                        .expect("issue");
                    builder = builder.header("authorization", format!("Bearer {}", token));
                    true
                }
                AuthHeader::ForeignKey(key) => {
                    let token = service(key, NOW).issue(&identity, "n", "e").expect("issue");
                    builder = builder.header("authorization", format!("Bearer {}", token));
                    key == server_key
                }
                AuthHeader::Garbage(token) => {
                    builder = builder.header("authorization", format!("Bearer {}", token));
                    false
                }
                AuthHeader::WrongScheme(value) => {
                    builder = builder.header("authorization", value.as_str());
                    false
                }
                AuthHeader::None => false,
            };

            let request = builder.body(Body::empty()).expect("request");
            let response = app.oneshot(request).await.expect("router is infallible");

            if expect_ok {
                prop_assert_eq!(response.status(), StatusCode::OK);
                let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                    .await
                    .expect("body");
                prop_assert_eq!(&body[..], identity.as_str().as_bytes());
            } else {
                prop_assert_eq!(
                    response.status(),
                    StatusCode::UNAUTHORIZED,
                    "Expected 401 for {:?}",
                    header
                );
            }
            Ok(())
        })?;
    }
}
