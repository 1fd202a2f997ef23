//! Basic scheme: username plus API key checked against hashed keys in the
//! user directory.

use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper_directory::{DirectoryResultExt, UserDirectory, UserRecord};
use zeroize::Zeroizing;

use crate::{
    authorizer::SchemeAuthorizer,
    config::AuthorizerConfig,
    context::AuthRequest,
    credential::{BasicCredential, Scheme},
    error::{AuthError, Result},
    hashing::verify_api_key,
    identity::{AuthorizationResult, IdentityTransformer},
};

/// Authorizes `Basic` credentials.
///
/// Candidates are the users registered under the username's email that
/// hold a hashed API key, are not blocked and have a verified email. The
/// presented key is checked against each candidate in directory order, one
/// hash at a time on the blocking pool, stopping at the first match.
pub struct BasicAuthorizer {
    users: Arc<dyn UserDirectory>,
    identity: IdentityTransformer,
}

impl std::fmt::Debug for BasicAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthorizer").finish_non_exhaustive()
    }
}

impl BasicAuthorizer {
    /// Creates the authorizer.
    #[must_use]
    pub fn new(config: Arc<AuthorizerConfig>, users: Arc<dyn UserDirectory>) -> Self {
        Self { users, identity: IdentityTransformer::new(config) }
    }

    async fn matches(&self, user: &UserRecord, api_key: &str) -> Result<bool> {
        let Some(hash) = user.app_metadata.api_key.clone() else {
            return Ok(false);
        };
        let api_key = Zeroizing::new(api_key.to_owned());

        let joined = tokio::task::spawn_blocking(move || verify_api_key(&api_key, &hash)).await;
        verification_outcome(joined)
    }
}

/// A verification task that panicked or was cancelled never counts as a
/// non-match.
fn verification_outcome(
    joined: std::result::Result<bool, tokio::task::JoinError>,
) -> Result<bool> {
    joined.map_err(|err| AuthError::internal(format!("API key verification task failed: {err}")))
}

#[async_trait]
impl SchemeAuthorizer for BasicAuthorizer {
    type Credential = BasicCredential;

    fn scheme(&self) -> Scheme {
        Scheme::Basic
    }

    #[tracing::instrument(skip_all, fields(username = %credential.username()))]
    async fn authorize(
        &self,
        credential: &BasicCredential,
        _request: &AuthRequest,
    ) -> Result<AuthorizationResult> {
        if credential.username().is_empty() || credential.api_key().is_empty() {
            return Err(AuthError::malformed_credential("username and API key are required"));
        }

        let candidates: Vec<UserRecord> = self
            .users
            .find_by_email(credential.username())
            .await
            .or_absent()?
            .into_iter()
            .filter(UserRecord::accepts_api_key)
            .collect();

        if candidates.is_empty() {
            tracing::debug!("no account accepts API keys for this username");
            return Ok(AuthorizationResult::Denied);
        }

        for user in &candidates {
            if self.matches(user, credential.api_key()).await? {
                tracing::debug!(user_id = %user.user_id, "API key matched");
                let usage = self.identity.derive_usage_key(user);
                return Ok(AuthorizationResult::Allowed(self.identity.authorize(
                    user,
                    Scheme::Basic,
                    usage,
                )));
            }
        }

        tracing::debug!(candidates = candidates.len(), "API key did not match any candidate");
        Ok(AuthorizationResult::Denied)
    }
}
