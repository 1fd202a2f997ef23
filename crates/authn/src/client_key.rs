//! Client-Key scheme: opaque keys with a per-key origin policy.
//!
//! # Origin policy
//!
//! A request passes when any of these holds:
//!
//! - the caller's origin hostname is a configured first-party hostname
//! - the key allows `*`
//! - the caller's origin hostname is one of the key's allowed domains
//!
//! Allowed domains are reduced to their hostnames; entries that are not
//! URLs are dropped. `websocket` is always allowed. An origin that is not a
//! URL is compared verbatim.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use gatekeeper_directory::{
    AppMetadata, ClientKeyDirectory, ClientKeyRecord, DirectoryResultExt, UserDirectory, UserRecord,
};
use serde_json::Map;
use url::Url;

use crate::{
    authorizer::SchemeAuthorizer,
    config::AuthorizerConfig,
    context::AuthRequest,
    credential::{ClientKeyCredential, Scheme},
    error::{AuthError, Result},
    identity::{AuthorizationResult, IdentityTransformer},
};

/// Allowed-domain entry that admits every origin.
pub const WILDCARD_ORIGIN: &str = "*";

/// Origin value used by websocket clients, always allowed.
pub const WEBSOCKET_ORIGIN: &str = "websocket";

/// Reduces an origin or domain to its hostname; non-URLs yield `None`.
fn hostname(value: &str) -> Option<String> {
    Url::parse(value).ok().and_then(|url| url.host_str().map(str::to_owned))
}

/// The effective set of hostnames a key may be used from.
#[must_use]
pub fn allowed_origins(domains: &[String]) -> BTreeSet<String> {
    let mut origins: BTreeSet<String> = domains
        .iter()
        .filter_map(|domain| {
            if domain == WILDCARD_ORIGIN {
                return Some(domain.clone());
            }
            let host = hostname(domain);
            if host.is_none() {
                tracing::debug!(domain = %domain, "dropping malformed allowed domain");
            }
            host
        })
        .collect();
    origins.insert(WEBSOCKET_ORIGIN.to_owned());
    origins
}

/// Authorizes `Client-Key` credentials.
pub struct ClientKeyAuthorizer {
    keys: Arc<dyn ClientKeyDirectory>,
    users: Arc<dyn UserDirectory>,
    config: Arc<AuthorizerConfig>,
    identity: IdentityTransformer,
}

impl std::fmt::Debug for ClientKeyAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKeyAuthorizer").finish_non_exhaustive()
    }
}

impl ClientKeyAuthorizer {
    /// Creates the authorizer.
    #[must_use]
    pub fn new(
        config: Arc<AuthorizerConfig>,
        keys: Arc<dyn ClientKeyDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self { keys, users, identity: IdentityTransformer::new(Arc::clone(&config)), config }
    }

    /// Applies the origin policy of `record` to the caller's origin.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::OriginNotAllowed`] if no rule admits the origin.
    pub fn check_origin(&self, record: &ClientKeyRecord, origin: Option<&str>) -> Result<()> {
        let allowed = allowed_origins(&record.allowed_domains);
        let caller = origin.map(|origin| hostname(origin).unwrap_or_else(|| origin.to_owned()));

        let first_party = caller.as_deref().is_some_and(|host| self.config.is_first_party_origin(host));
        let listed = caller.as_deref().is_some_and(|host| allowed.contains(host));

        if first_party || allowed.contains(WILDCARD_ORIGIN) || listed {
            Ok(())
        } else {
            Err(AuthError::origin_not_allowed(origin))
        }
    }

    /// Finds the account behind the key's owner, if there is one.
    ///
    /// Organization keys resolve to the first user registered under the
    /// record's email; other keys resolve the owner as a user id.
    async fn resolve_owner(&self, record: &ClientKeyRecord) -> Result<Option<UserRecord>> {
        let lookup = if record.owner_is_organization() {
            match record.email.as_deref() {
                Some(email) => self.users.find_by_email(email).await.map(|users| users.into_iter().next()),
                None => Ok(None),
            }
        } else {
            self.users.find_by_id(&record.owner).await
        };

        lookup.or_absent().map_err(AuthError::from)
    }

    /// Builds the user the key acts as.
    fn synthesize(&self, record: &ClientKeyRecord, existing: Option<&UserRecord>) -> UserRecord {
        let inherited = existing.map(|user| &user.app_metadata);
        let usage_identifier_key = inherited
            .and_then(AppMetadata::usage_identifier_key)
            .unwrap_or(self.config.default_usage_identifier_key())
            .to_owned();

        UserRecord {
            user_id: record.owner.clone(),
            email: record.email.clone(),
            blocked: false,
            email_verified: false,
            user_metadata: Map::new(),
            app_metadata: AppMetadata {
                usage_identifier_key: Some(usage_identifier_key),
                org_id: record.org_id.clone(),
                features: inherited.and_then(|meta| meta.features.clone()),
                stripe_plan_group: inherited.and_then(|meta| meta.stripe_plan_group.clone()),
                stripe_product_name: inherited.and_then(|meta| meta.stripe_product_name.clone()),
                plan: inherited.and_then(|meta| meta.plan.clone()),
                ..AppMetadata::default()
            },
        }
    }
}

#[async_trait]
impl SchemeAuthorizer for ClientKeyAuthorizer {
    type Credential = ClientKeyCredential;

    fn scheme(&self) -> Scheme {
        Scheme::ClientKey
    }

    #[tracing::instrument(skip_all, fields(key = %credential.key_hint()))]
    async fn authorize(
        &self,
        credential: &ClientKeyCredential,
        request: &AuthRequest,
    ) -> Result<AuthorizationResult> {
        let record = self
            .keys
            .find_by_key(credential.key())
            .await
            .or_absent()?
            .filter(|record| record.key.as_str() == credential.key())
            .ok_or(AuthError::InvalidClientKey)?;

        self.check_origin(&record, request.origin())?;

        let existing = self.resolve_owner(&record).await?;
        if existing.is_none() {
            tracing::debug!(owner = %record.owner, "client key owner has no account");
        }

        let user = self.synthesize(&record, existing.as_ref());
        let usage = self.identity.derive_usage_key(&user);
        let mut authorized = self.identity.authorize(&user, Scheme::ClientKey, usage);
        authorized.attributes.use_case = record.use_case.clone();
        authorized.attributes.external_id = credential.external_id().map(str::to_owned);

        Ok(AuthorizationResult::Allowed(authorized))
    }
}
