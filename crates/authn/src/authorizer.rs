//! The dispatch point for all authorization schemes.
//!
//! # Flow
//!
//! ```text
//! AuthRequest
//!     → Authorization header present?        (else MissingAuthorization)
//!     → Credential::parse                    (UnknownScheme / MalformedCredential)
//!     → Bearer | Basic | ClientKey authorizer
//!     → IdentityTransformer
//!     → AuthorizationResult
//! ```
//!
//! Every call runs in one `authorize` span carrying the correlation id, the
//! scheme and a redacted credential hint. Outcomes are logged by severity:
//! collaborator failures at `error`, expired tokens at `warn`, other
//! rejections and denials at `info`.

use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper_directory::{ClientKeyDirectory, UserDirectory};

use crate::{
    basic::BasicAuthorizer,
    bearer::BearerAuthorizer,
    client_key::ClientKeyAuthorizer,
    config::AuthorizerConfig,
    context::AuthRequest,
    credential::{Credential, Scheme},
    error::{AuthError, ConfigError, Result},
    identity::AuthorizationResult,
    signing_key::{HttpJwksFetcher, JwksKeyResolver, SigningKeyResolver},
};

/// Handles one credential variant.
#[async_trait]
pub trait SchemeAuthorizer: Send + Sync {
    /// The credential variant this authorizer accepts.
    type Credential: Send + Sync;

    /// The scheme this authorizer handles.
    fn scheme(&self) -> Scheme;

    /// Authorizes a parsed credential.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the credential is rejected or a
    /// collaborator fails. A well-formed credential that matches no account
    /// is `Ok(AuthorizationResult::Denied)`.
    async fn authorize(
        &self,
        credential: &Self::Credential,
        request: &AuthRequest,
    ) -> Result<AuthorizationResult>;
}

/// Multi-scheme request authorizer.
///
/// Holds no per-request state; share one instance (behind an `Arc`) across
/// all requests.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use gatekeeper_authn::{AuthRequest, Authorizer, config::AuthorizerConfig};
/// use gatekeeper_directory::{MemoryClientKeyDirectory, MemoryUserDirectory};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AuthorizerConfig::from_env()?;
/// let authorizer = Authorizer::from_config(
///     config,
///     Arc::new(MemoryUserDirectory::new()),
///     Arc::new(MemoryClientKeyDirectory::new()),
/// )?;
///
/// let result = authorizer.authorize(&AuthRequest::new("Client-Key abc123")).await?;
/// println!("allowed: {}", result.is_allowed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Authorizer {
    bearer: BearerAuthorizer,
    basic: BasicAuthorizer,
    client_key: ClientKeyAuthorizer,
}

#[bon::bon]
impl Authorizer {
    /// Creates an authorizer from explicit collaborators.
    #[builder]
    pub fn new(
        config: Arc<AuthorizerConfig>,
        signing_keys: Arc<dyn SigningKeyResolver>,
        users: Arc<dyn UserDirectory>,
        client_keys: Arc<dyn ClientKeyDirectory>,
    ) -> Self {
        Self {
            bearer: BearerAuthorizer::new(Arc::clone(&config), signing_keys),
            basic: BasicAuthorizer::new(Arc::clone(&config), Arc::clone(&users)),
            client_key: ClientKeyAuthorizer::new(config, client_keys, users),
        }
    }
}

impl Authorizer {
    /// Creates an authorizer that fetches signing keys over HTTPS from the
    /// configured key-set URI.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Invalid`] if the configuration breaks an invariant
    /// - [`ConfigError::KeySetClient`] if the HTTP client cannot be built
    pub fn from_config(
        config: AuthorizerConfig,
        users: Arc<dyn UserDirectory>,
        client_keys: Arc<dyn ClientKeyDirectory>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let jwks = config.bearer().jwks();
        let fetcher = HttpJwksFetcher::new(jwks).map_err(ConfigError::KeySetClient)?;
        let resolver = JwksKeyResolver::new(Arc::new(fetcher), jwks);

        Ok(Self::builder()
            .config(Arc::new(config))
            .signing_keys(Arc::new(resolver))
            .users(users)
            .client_keys(client_keys)
            .build())
    }

    /// Authorizes a request.
    ///
    /// Calls are independent: the same request always yields the same
    /// outcome for the same directory and key-set contents.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingAuthorization`] if there is no `Authorization` header
    /// - [`AuthError::UnknownScheme`] / [`AuthError::MalformedCredential`] from parsing
    /// - any scheme-specific rejection or collaborator failure
    #[tracing::instrument(
        name = "authorize",
        skip_all,
        fields(
            correlation_id = request.correlation_id().unwrap_or("-"),
            scheme = tracing::field::Empty,
            credential = tracing::field::Empty,
        )
    )]
    pub async fn authorize(&self, request: &AuthRequest) -> Result<AuthorizationResult> {
        let outcome = self.dispatch(request).await;
        log_outcome(&outcome);
        outcome
    }

    async fn dispatch(&self, request: &AuthRequest) -> Result<AuthorizationResult> {
        let header = request.authorization().ok_or(AuthError::MissingAuthorization)?;
        let credential = Credential::parse(header)?;

        let span = tracing::Span::current();
        span.record("scheme", credential.scheme().as_str());
        match &credential {
            Credential::Bearer(_) => {},
            Credential::Basic(basic) => {
                span.record("credential", basic.username());
            },
            Credential::ClientKey(key) => {
                span.record("credential", key.key_hint().as_str());
            },
        }

        match &credential {
            Credential::Bearer(token) => self.bearer.authorize(token, request).await,
            Credential::Basic(basic) => self.basic.authorize(basic, request).await,
            Credential::ClientKey(key) => self.client_key.authorize(key, request).await,
        }
    }
}

fn log_outcome(outcome: &Result<AuthorizationResult>) {
    match outcome {
        Ok(AuthorizationResult::Allowed(user)) => {
            tracing::debug!(user_id = %user.id, principal_id = %user.principal_id, "request authorized");
        },
        Ok(AuthorizationResult::Denied) => {
            tracing::info!("request denied");
        },
        Err(err) if err.is_collaborator_failure() => {
            tracing::error!(kind = %err.kind(), error = %err, "authorization failed: collaborator unavailable");
        },
        Err(err @ AuthError::TokenExpired) => {
            tracing::warn!(kind = %err.kind(), "authorization rejected: token expired");
        },
        Err(err) => {
            tracing::info!(kind = %err.kind(), error = %err, "authorization rejected");
        },
    }
}
