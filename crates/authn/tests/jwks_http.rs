//! Key-set fetching over HTTP against a mock identity provider.
#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use gatekeeper_authn::{
    AuthRequest, Authorizer, HttpJwksFetcher, JwksFetcher, JwksKeyResolver, KeyResolverError,
    SigningKeyResolver,
    config::{AuthorizerConfig, BearerConfig, JwksConfig},
    testutil::{TestSigningKey, token_claims},
};
use gatekeeper_directory::{MemoryClientKeyDirectory, MemoryUserDirectory};
use serde_json::json;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const JWKS_PATH: &str = "/.well-known/jwks.json";
const AUDIENCE: &str = "https://tenant.example.com/api/v2/";
const ISSUER: &str = "https://auth.example.com/";

fn jwks_uri(server: &MockServer) -> Url {
    format!("{}{JWKS_PATH}", server.uri()).parse().expect("mock server uri")
}

fn jwks_config(server: &MockServer) -> JwksConfig {
    JwksConfig::builder()
        .uri(jwks_uri(server))
        .request_timeout(Duration::from_secs(2))
        .build()
        .expect("jwks config")
}

async fn serve_keys(server: &MockServer, keys: &[&TestSigningKey]) {
    let body = json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() });
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_key_set() {
    let server = MockServer::start().await;
    let first = TestSigningKey::new("kid-1");
    let second = TestSigningKey::new("kid-2");
    serve_keys(&server, &[&first, &second]).await;

    let fetcher = HttpJwksFetcher::new(&jwks_config(&server)).expect("fetcher");
    let set = fetcher.fetch().await.expect("fetch");

    let kids: Vec<_> = set.keys.iter().filter_map(|jwk| jwk.common.key_id.as_deref()).collect();
    assert_eq!(kids, ["kid-1", "kid-2"]);
}

#[tokio::test]
async fn test_server_error_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = HttpJwksFetcher::with_client(reqwest::Client::new(), jwks_uri(&server));
    let result = fetcher.fetch().await;

    assert!(matches!(result, Err(KeyResolverError::Fetch { .. })), "got: {result:?}");
}

#[tokio::test]
async fn test_non_jwks_body_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let fetcher = HttpJwksFetcher::with_client(reqwest::Client::new(), jwks_uri(&server));
    let result = fetcher.fetch().await;

    assert!(matches!(result, Err(KeyResolverError::Fetch { .. })), "got: {result:?}");
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = JwksConfig::builder()
        .uri(jwks_uri(&server))
        .request_timeout(Duration::from_millis(200))
        .build()
        .expect("jwks config");
    let result = HttpJwksFetcher::new(&config).expect("fetcher").fetch().await;

    assert!(matches!(result, Err(KeyResolverError::Fetch { .. })), "got: {result:?}");
}

#[tokio::test]
async fn test_resolver_fetches_once_for_cached_keys() {
    let server = MockServer::start().await;
    let key = TestSigningKey::new("kid-1");
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [key.jwk()] })))
        .expect(1)
        .mount(&server)
        .await;

    let config = jwks_config(&server);
    let fetcher: Arc<dyn JwksFetcher> = Arc::new(HttpJwksFetcher::new(&config).expect("fetcher"));
    let resolver = JwksKeyResolver::new(fetcher, &config);

    for _ in 0..5 {
        resolver.resolve("kid-1").await.expect("resolve");
    }
    assert_eq!(resolver.fetch_count(), 1);
}

#[tokio::test]
async fn test_bearer_end_to_end_over_http() {
    let server = MockServer::start().await;
    let key = TestSigningKey::new("kid-1");
    serve_keys(&server, &[&key]).await;

    let bearer = BearerConfig::builder()
        .audience(AUDIENCE)
        .issuer(ISSUER)
        .jwks(jwks_config(&server))
        .build()
        .expect("bearer config");
    let config = AuthorizerConfig::builder()
        .default_principal_id("default-principal")
        .default_usage_identifier_key("default-usage")
        .bearer(bearer)
        .build()
        .expect("authorizer config");
    let authorizer = Authorizer::from_config(
        config,
        Arc::new(MemoryUserDirectory::new()),
        Arc::new(MemoryClientKeyDirectory::new()),
    )
    .expect("authorizer");

    let token = key.sign(&token_claims("auth0|http", ISSUER, AUDIENCE, 3600));
    let result = authorizer.authorize(&AuthRequest::new(format!("Bearer {token}"))).await.expect("authorize");

    let user = result.user().expect("allowed");
    assert_eq!(user.id, "auth0|http");
    assert_eq!(user.usage_identifier_key, "default-usage");
}
