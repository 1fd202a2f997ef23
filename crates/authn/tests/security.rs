//! Security-focused authentication tests.
//!
//! These tests verify the authorizer's resistance to common attacks on each
//! scheme: algorithm substitution, algorithm confusion, expired tokens,
//! signature and audience mismatches, key rotation during active use,
//! malformed JWT structures and secret leakage through `Debug` output.
#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use gatekeeper_authn::{
    AuthError, AuthErrorKind, AuthRequest, Authorizer, Credential, JwksFetcher, JwksKeyResolver,
    KeyResolverError, SigningKeyResolver,
    config::{AuthorizerConfig, BearerConfig, JwksConfig},
    credential::BasicCredential,
    testutil::{CountingJwksFetcher, TestSigningKey, bcrypt_hash, craft_raw_jwt, jwk_set, token_claims},
    validation::validate_algorithm,
};
use gatekeeper_directory::{
    ClientKeyRecord, MemoryClientKeyDirectory, MemoryUserDirectory, testutil::api_key_user,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const AUDIENCE: &str = "https://tenant.example.com/api/v2/";
const ISSUER: &str = "https://auth.example.com/";

fn config() -> AuthorizerConfig {
    let bearer = BearerConfig::builder()
        .audience(AUDIENCE)
        .issuer(ISSUER)
        .jwks(
            JwksConfig::builder()
                .uri("https://tenant.example.com/.well-known/jwks.json".parse().expect("uri"))
                .build()
                .expect("jwks config"),
        )
        .build()
        .expect("bearer config");
    AuthorizerConfig::builder()
        .default_principal_id("default-principal")
        .default_usage_identifier_key("default-usage")
        .bearer(bearer)
        .build()
        .expect("authorizer config")
}

struct Harness {
    fetcher: Arc<CountingJwksFetcher>,
    resolver: Arc<JwksKeyResolver>,
    authorizer: Authorizer,
}

fn harness(published: &[&TestSigningKey]) -> Harness {
    let fetcher = Arc::new(CountingJwksFetcher::new(jwk_set(published.iter().map(|key| key.jwk()))));
    let resolver = Arc::new(JwksKeyResolver::with_limits(
        Arc::clone(&fetcher) as Arc<dyn JwksFetcher>,
        60,
        100,
    ));
    let authorizer = Authorizer::builder()
        .config(Arc::new(config()))
        .signing_keys(Arc::clone(&resolver) as Arc<dyn SigningKeyResolver>)
        .users(Arc::new(MemoryUserDirectory::new()))
        .client_keys(Arc::new(MemoryClientKeyDirectory::new()))
        .build();

    Harness { fetcher, resolver, authorizer }
}

fn valid_claims() -> serde_json::Value {
    token_claims("auth0|attacker", ISSUER, AUDIENCE, 3600)
}

async fn authorize_bearer(
    authorizer: &Authorizer,
    token: &str,
) -> gatekeeper_authn::Result<gatekeeper_authn::AuthorizationResult> {
    authorizer.authorize(&AuthRequest::new(format!("Bearer {token}"))).await
}

// ===========================================================================
// 1. Algorithm substitution: JWT with `alg: "none"` must be rejected
// ===========================================================================

#[test]
fn test_algorithm_none_rejected_before_key_lookup() {
    let result = validate_algorithm("none");
    assert!(
        matches!(&result, Err(AuthError::UnsupportedAlgorithm { message }) if message.contains("not allowed for security reasons")),
        "Expected 'none' to be rejected with security message, got: {result:?}"
    );
}

#[tokio::test]
async fn test_algorithm_none_jwt_rejected_end_to_end() {
    let key = TestSigningKey::new("none-alg-key");
    let h = harness(&[&key]);

    let header = json!({ "typ": "JWT", "alg": "none", "kid": key.kid() });
    let token = craft_raw_jwt(&header, &valid_claims());

    let result = authorize_bearer(&h.authorizer, &token).await;
    // `jsonwebtoken` does not know `none` as an algorithm, so the header
    // fails to decode. Either rejection path keeps the token away from key
    // lookup.
    assert!(
        matches!(&result, Err(AuthError::UnsupportedAlgorithm { .. } | AuthError::InvalidToken { .. })),
        "Security: JWT with alg:'none' must be rejected, got: {result:?}"
    );
    assert_eq!(h.fetcher.fetch_count(), 0, "key set must not be fetched");
}

#[test]
fn test_forbidden_algorithms_matched_case_insensitively() {
    for alg in ["NONE", "None", "hs256", "Hs384", "hS512"] {
        let result = validate_algorithm(alg);
        assert!(
            matches!(&result, Err(AuthError::UnsupportedAlgorithm { message }) if message.contains("not allowed for security reasons")),
            "Security: '{alg}' must be rejected as forbidden, got: {result:?}"
        );
    }
}

// ===========================================================================
// 2. Algorithm confusion: HS256 with the published public key as HMAC secret
// ===========================================================================

#[test]
fn test_all_forbidden_algorithms_rejected_with_security_message() {
    for alg in ["none", "HS256", "HS384", "HS512"] {
        let result = validate_algorithm(alg);
        assert!(
            matches!(&result, Err(AuthError::UnsupportedAlgorithm { message }) if message.contains("not allowed for security reasons")),
            "Security: forbidden algorithm '{alg}' must be rejected with security message, got: {result:?}"
        );
    }
}

#[tokio::test]
async fn test_algorithm_confusion_hs256_end_to_end() {
    let key = TestSigningKey::new("confusion-key");
    let h = harness(&[&key]);

    // Sign with HS256 using the public key bytes as HMAC secret
    let public_x = key.jwk()["x"].as_str().expect("x").to_owned();
    let secret: Zeroizing<Vec<u8>> =
        Zeroizing::new(URL_SAFE_NO_PAD.decode(public_x).expect("decode public key"));
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(key.kid().to_owned());
    let token = jsonwebtoken::encode(&header, &valid_claims(), &EncodingKey::from_secret(&secret))
        .expect("Failed to encode HS256 JWT");

    let result = authorize_bearer(&h.authorizer, &token).await;
    assert!(
        matches!(&result, Err(AuthError::UnsupportedAlgorithm { message }) if message.contains("not allowed for security reasons")),
        "Security: HS256-signed JWT must be rejected even with valid HMAC, got: {result:?}"
    );
    assert_eq!(result.expect_err("rejected").kind(), AuthErrorKind::InvalidToken);
    assert_eq!(h.fetcher.fetch_count(), 0, "key set must not be fetched");
}

#[tokio::test]
async fn test_unaccepted_asymmetric_algorithm_rejected() {
    let key = TestSigningKey::new("es-key");
    let h = harness(&[&key]);
    let token = craft_raw_jwt(&json!({ "alg": "ES256", "typ": "JWT", "kid": key.kid() }), &valid_claims());

    let result = authorize_bearer(&h.authorizer, &token).await;
    assert!(
        matches!(&result, Err(AuthError::UnsupportedAlgorithm { message }) if message.contains("not in accepted list")),
        "ES256 must be rejected as not-accepted (not forbidden), got: {result:?}"
    );
}

// ===========================================================================
// 3. Expiry and claim checks
// ===========================================================================

#[tokio::test]
async fn test_token_expired_an_hour_ago_rejected() {
    let key = TestSigningKey::new("exp-key");
    let h = harness(&[&key]);
    let token = key.sign(&token_claims("auth0|1", ISSUER, AUDIENCE, -3600));

    let result = authorize_bearer(&h.authorizer, &token).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)), "got: {result:?}");
}

#[tokio::test]
async fn test_wrong_audience_rejected() {
    let key = TestSigningKey::new("aud-key");
    let h = harness(&[&key]);
    let token = key.sign(&token_claims("auth0|1", ISSUER, "https://other.example.com/", 3600));

    let result = authorize_bearer(&h.authorizer, &token).await;
    assert!(matches!(result, Err(AuthError::InvalidToken { .. })), "got: {result:?}");
}

#[tokio::test]
async fn test_wrong_issuer_rejected() {
    let key = TestSigningKey::new("iss-key");
    let h = harness(&[&key]);
    let token = key.sign(&token_claims("auth0|1", "https://evil.example.com/", AUDIENCE, 3600));

    let result = authorize_bearer(&h.authorizer, &token).await;
    assert!(matches!(result, Err(AuthError::InvalidToken { .. })), "got: {result:?}");
}

// ===========================================================================
// 4. Signature mismatch: token signed by a key that shares the published kid
// ===========================================================================

#[tokio::test]
async fn test_signature_from_impostor_key_rejected() {
    let published = TestSigningKey::new("shared-kid");
    let impostor = TestSigningKey::new("shared-kid");
    let h = harness(&[&published]);

    let result = authorize_bearer(&h.authorizer, &impostor.sign(&valid_claims())).await;
    assert!(matches!(result, Err(AuthError::InvalidToken { .. })), "got: {result:?}");
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let key = TestSigningKey::new("tamper-key");
    let h = harness(&[&key]);
    let token = key.sign(&valid_claims());

    let forged = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&token_claims("auth0|admin", ISSUER, AUDIENCE, 3600)).expect("json"),
    );
    let mut parts: Vec<&str> = token.split('.').collect();
    parts[1] = &forged;

    let result = authorize_bearer(&h.authorizer, &parts.join(".")).await;
    assert!(matches!(result, Err(AuthError::InvalidToken { .. })), "got: {result:?}");
}

// ===========================================================================
// 5. Key rotation: new keys are picked up, revoked keys stop verifying
// ===========================================================================

#[tokio::test]
async fn test_key_rotation_during_active_use() {
    let old_key = TestSigningKey::new("rotation-old");
    let new_key = TestSigningKey::new("rotation-new");
    let h = harness(&[&old_key]);

    let old_token = old_key.sign(&valid_claims());
    let new_token = new_key.sign(&valid_claims());

    assert!(authorize_bearer(&h.authorizer, &old_token).await.expect("old key").is_allowed());

    // New key not yet published
    let result = authorize_bearer(&h.authorizer, &new_token).await;
    assert!(
        matches!(&result, Err(AuthError::KeyResolution { source: KeyResolverError::NotFound { .. }, .. })),
        "unpublished key must not resolve, got: {result:?}"
    );

    // Publish the new key and revoke the old one
    h.fetcher.set_keys(jwk_set([new_key.jwk()]));
    h.resolver.invalidate(old_key.kid()).await;

    assert!(authorize_bearer(&h.authorizer, &new_token).await.expect("new key").is_allowed());

    let old_result = authorize_bearer(&h.authorizer, &old_token).await;
    assert!(
        matches!(&old_result, Err(AuthError::KeyResolution { .. })),
        "Old key JWT must be rejected after revocation, got: {old_result:?}"
    );
}

#[tokio::test]
async fn test_unknown_kid_flood_is_rate_limited() {
    let key = TestSigningKey::new("known");
    let fetcher = Arc::new(CountingJwksFetcher::new(jwk_set([key.jwk()])));
    let resolver = JwksKeyResolver::with_limits(Arc::clone(&fetcher) as Arc<dyn JwksFetcher>, 3, 100);

    let mut rate_limited = 0;
    for i in 0..10 {
        if let Err(KeyResolverError::RateLimited { .. }) = resolver.resolve(&format!("bogus-{i}")).await {
            rate_limited += 1;
        }
    }

    assert_eq!(fetcher.fetch_count(), 3, "fetches must stay within the budget");
    assert_eq!(rate_limited, 7);
    assert_eq!(resolver.rate_limited_count(), 7);
}

// ===========================================================================
// 6. Malformed JWT structure tests
// ===========================================================================

#[tokio::test]
async fn test_malformed_jwts_rejected() {
    let h = harness(&[]);
    let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT","kid":"k1"}"#);
    let cases = [
        "just-one-part".to_owned(),
        "header.payload".to_owned(),
        "a.b.c.d".to_owned(),
        "not.a.jwt".to_owned(),
        format!("{header_b64}.!!!not-valid-base64!!!.signature"),
        format!("{header_b64}.{}.signature", URL_SAFE_NO_PAD.encode(b"this is not json")),
    ];

    for token in &cases {
        let result = authorize_bearer(&h.authorizer, token).await;
        let err = result.expect_err("malformed token must be rejected");
        assert_eq!(err.kind(), AuthErrorKind::InvalidToken, "token {token:?} gave {err:?}");
        assert!(!err.is_collaborator_failure());
    }
}

#[tokio::test]
async fn test_empty_bearer_token_is_malformed() {
    let h = harness(&[]);
    let result = h.authorizer.authorize(&AuthRequest::new("Bearer    ")).await;
    assert!(matches!(result, Err(AuthError::MalformedCredential { .. })), "got: {result:?}");
}

#[tokio::test]
async fn test_oversized_kid_rejected_before_key_lookup() {
    let h = harness(&[]);
    let kid = "k".repeat(1024);
    let token = craft_raw_jwt(&json!({ "alg": "EdDSA", "typ": "JWT", "kid": kid }), &valid_claims());

    let result = authorize_bearer(&h.authorizer, &token).await;
    assert!(matches!(result, Err(AuthError::InvalidToken { .. })), "got: {result:?}");
    assert_eq!(h.fetcher.fetch_count(), 0);
}

// ===========================================================================
// 7. Secret material never appears in Debug output or error messages
// ===========================================================================

#[test]
fn test_credentials_redacted_in_debug() {
    let bearer = Credential::parse("Bearer eyJhbGciOiJFZERTQSJ9.secret-payload.sig").expect("bearer");
    assert!(!format!("{bearer:?}").contains("secret-payload"));

    let basic = Credential::parse(&BasicCredential::encode("dev@example.com", "super-secret-key"))
        .expect("basic");
    let debug = format!("{basic:?}");
    assert!(debug.contains("dev@example.com"));
    assert!(!debug.contains("super-secret-key"));

    let client_key = Credential::parse("Client-Key abcdef0123456789.ext-1").expect("client key");
    assert!(!format!("{client_key:?}").contains("abcdef0123456789"));
}

#[test]
fn test_client_key_record_redacted_in_debug() {
    let record = ClientKeyRecord::builder().key("abcdef0123456789").owner("auth0|1").build();
    assert!(!format!("{record:?}").contains("abcdef0123456789"));
}

#[tokio::test]
async fn test_api_key_hash_never_exposed_in_result() {
    let hash = bcrypt_hash("apikey");
    let users = MemoryUserDirectory::with_users([api_key_user("auth0|1", "dev@example.com", &hash)]);
    let key = TestSigningKey::new("unused");
    let fetcher = Arc::new(CountingJwksFetcher::new(jwk_set([key.jwk()])));
    let authorizer = Authorizer::builder()
        .config(Arc::new(config()))
        .signing_keys(Arc::new(JwksKeyResolver::with_limits(fetcher, 10, 10)))
        .users(Arc::new(users))
        .client_keys(Arc::new(MemoryClientKeyDirectory::new()))
        .build();

    let result = authorizer
        .authorize(&AuthRequest::new(BasicCredential::encode("dev@example.com", "apikey")))
        .await
        .expect("authorize");
    assert!(result.is_allowed());

    let rendered = serde_json::to_string(&result).expect("serialize");
    assert!(!rendered.contains(&hash));
    assert!(!rendered.contains("apikey"));
}

#[tokio::test]
async fn test_wrong_api_key_error_free_of_secrets() {
    let h = harness(&[]);
    let result = h
        .authorizer
        .authorize(&AuthRequest::new(BasicCredential::encode("dev@example.com", "leaky-secret")))
        .await
        .expect("denial is not an error");
    assert!(!result.is_allowed());
    assert!(!serde_json::to_string(&result).expect("serialize").contains("leaky-secret"));
}
