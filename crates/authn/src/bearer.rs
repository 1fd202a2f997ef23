//! Bearer scheme: signed JWTs verified through a [`SigningKeyResolver`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    authorizer::SchemeAuthorizer,
    config::AuthorizerConfig,
    context::AuthRequest,
    credential::{BearerToken, Scheme},
    error::{AuthError, Result},
    identity::{AuthorizationResult, IdentityTransformer},
    jwt::{IssuerTrial, algorithm_name, claims_to_user, decode_jwt_header, verify_with_trials},
    signing_key::SigningKeyResolver,
    validation::{validate_algorithm, validate_kid},
};

/// Authorizes `Bearer` credentials.
///
/// 1. Decode the header and check `kid` and `alg`
/// 2. Resolve the verification key by `kid`
/// 3. Verify against each [`IssuerTrial`] in order
/// 4. Build the user from `sub` and the namespaced claims
///
/// Bearer callers are always billed against the configured default usage
/// pair.
pub struct BearerAuthorizer {
    resolver: Arc<dyn SigningKeyResolver>,
    trials: Vec<IssuerTrial>,
    claim_namespace: String,
    identity: IdentityTransformer,
}

impl std::fmt::Debug for BearerAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthorizer")
            .field("trials", &self.trials)
            .field("claim_namespace", &self.claim_namespace)
            .finish_non_exhaustive()
    }
}

impl BearerAuthorizer {
    /// Creates the authorizer from the Bearer section of `config`.
    #[must_use]
    pub fn new(config: Arc<AuthorizerConfig>, resolver: Arc<dyn SigningKeyResolver>) -> Self {
        Self {
            resolver,
            trials: IssuerTrial::from_config(config.bearer()),
            claim_namespace: config.bearer().claim_namespace().to_owned(),
            identity: IdentityTransformer::new(config),
        }
    }

    /// The issuer pairs tokens are verified against, in order.
    #[must_use]
    pub fn trials(&self) -> &[IssuerTrial] {
        &self.trials
    }
}

#[async_trait]
impl SchemeAuthorizer for BearerAuthorizer {
    type Credential = BearerToken;

    fn scheme(&self) -> Scheme {
        Scheme::Bearer
    }

    #[tracing::instrument(skip_all, fields(kid = tracing::field::Empty))]
    async fn authorize(&self, token: &BearerToken, _request: &AuthRequest) -> Result<AuthorizationResult> {
        let token = token.as_str();
        let header = decode_jwt_header(token)?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid_token("JWT header missing 'kid' field"))?;
        validate_kid(&kid)?;
        tracing::Span::current().record("kid", kid.as_str());

        validate_algorithm(&algorithm_name(header.alg))?;

        let key = self
            .resolver
            .resolve(&kid)
            .await
            .map_err(|source| AuthError::key_resolution(kid.as_str(), source))?;

        let claims = verify_with_trials(token, &key, header.alg, &self.trials)?;
        let user = claims_to_user(&claims, &self.claim_namespace)?;
        tracing::debug!(user_id = %user.user_id, "bearer token verified");

        Ok(AuthorizationResult::Allowed(self.identity.authorize(
            &user,
            Scheme::Bearer,
            self.identity.default_usage_key(),
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        assert_auth_error,
        config::{BearerConfig, JwksConfig},
        credential::Credential,
        error::KeyResolverError,
        signing_key::{JwksFetcher, JwksKeyResolver},
        testutil::{CountingJwksFetcher, TestSigningKey, craft_raw_jwt, jwk_set, token_claims},
    };

    const AUDIENCE: &str = "https://tenant.example.com/api/v2/";
    const ISSUER: &str = "https://auth.example.com/";

    fn config(deprecated: Option<&str>) -> Arc<AuthorizerConfig> {
        let bearer = BearerConfig::builder()
            .audience(AUDIENCE)
            .issuer(ISSUER)
            .maybe_deprecated_issuer(deprecated)
            .jwks(
                JwksConfig::builder()
                    .uri("https://tenant.example.com/.well-known/jwks.json".parse().unwrap())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        Arc::new(
            AuthorizerConfig::builder()
                .default_principal_id("default-principal")
                .default_usage_identifier_key("default-usage")
                .bearer(bearer)
                .build()
                .unwrap(),
        )
    }

    fn authorizer(key: &TestSigningKey) -> (Arc<CountingJwksFetcher>, BearerAuthorizer) {
        let fetcher = Arc::new(CountingJwksFetcher::new(jwk_set([key.jwk()])));
        let resolver =
            JwksKeyResolver::with_limits(Arc::clone(&fetcher) as Arc<dyn JwksFetcher>, 10, 100);
        (fetcher, BearerAuthorizer::new(config(Some("https://tenant.example.com/")), Arc::new(resolver)))
    }

    fn bearer(token: &str) -> BearerToken {
        match Credential::parse(&format!("Bearer {token}")).unwrap() {
            Credential::Bearer(token) => token,
            other => panic!("expected bearer credential, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_token() {
        let key = TestSigningKey::new("kid-1");
        let (_, authorizer) = authorizer(&key);
        let mut claims = token_claims("auth0|1", ISSUER, AUDIENCE, 3600);
        claims["email"] = json!("dev@example.com");
        claims["https://d-id.com/plan"] = json!("pro");

        let result = authorizer.authorize(&bearer(&key.sign(&claims)), &AuthRequest::default()).await.unwrap();

        let user = result.user().expect("allowed");
        assert_eq!(user.id, "auth0|1");
        assert_eq!(user.principal_id, "default-principal");
        assert_eq!(user.usage_identifier_key, "default-usage");
        assert_eq!(user.attributes.email.as_deref(), Some("dev@example.com"));
        assert_eq!(user.attributes.authorization_scheme, Scheme::Bearer);
        assert!(user.attributes.app_metadata.contains("\"plan\":\"pro\""));
    }

    #[test]
    fn test_duplicate_issuer_trial_collapsed() {
        let resolver = JwksKeyResolver::with_limits(Arc::new(CountingJwksFetcher::new(jwk_set([]))), 10, 10);
        let authorizer = BearerAuthorizer::new(config(Some(ISSUER)), Arc::new(resolver));
        assert_eq!(authorizer.trials().len(), 1);

        let resolver = JwksKeyResolver::with_limits(Arc::new(CountingJwksFetcher::new(jwk_set([]))), 10, 10);
        let authorizer = BearerAuthorizer::new(config(None), Arc::new(resolver));
        assert_eq!(authorizer.trials().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_kid() {
        let key = TestSigningKey::new("kid-1");
        let (fetcher, authorizer) = authorizer(&key);
        let token = key.sign_with_kid(&token_claims("auth0|1", ISSUER, AUDIENCE, 3600), None);

        let result = authorizer.authorize(&bearer(&token), &AuthRequest::default()).await;

        assert_auth_error!(result, InvalidToken);
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_symmetric_algorithm_rejected_before_key_lookup() {
        let key = TestSigningKey::new("kid-1");
        let (fetcher, authorizer) = authorizer(&key);
        let token = craft_raw_jwt(
            &json!({ "alg": "HS256", "typ": "JWT", "kid": "kid-1" }),
            &token_claims("auth0|1", ISSUER, AUDIENCE, 3600),
        );

        let result = authorizer.authorize(&bearer(&token), &AuthRequest::default()).await;

        assert_auth_error!(result, UnsupportedAlgorithm);
        assert_eq!(result.unwrap_err().kind(), crate::error::AuthErrorKind::InvalidToken);
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_kid_is_key_resolution_failure() {
        let key = TestSigningKey::new("kid-1");
        let (_, authorizer) = authorizer(&key);
        let other = TestSigningKey::new("kid-2");
        let token = other.sign(&token_claims("auth0|1", ISSUER, AUDIENCE, 3600));

        let err = authorizer.authorize(&bearer(&token), &AuthRequest::default()).await.unwrap_err();

        assert!(matches!(
            &err,
            AuthError::KeyResolution { source: KeyResolverError::NotFound { .. }, .. }
        ));
        assert!(!err.is_collaborator_failure());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_collaborator_failure() {
        let key = TestSigningKey::new("kid-1");
        let (fetcher, authorizer) = authorizer(&key);
        fetcher.set_failure(Some(KeyResolverError::fetch("connection refused")));

        let err = authorizer
            .authorize(&bearer(&key.sign(&token_claims("auth0|1", ISSUER, AUDIENCE, 3600))), &AuthRequest::default())
            .await
            .unwrap_err();

        assert!(err.is_collaborator_failure());
        assert_eq!(err.kind(), crate::error::AuthErrorKind::InvalidToken);
    }
}
