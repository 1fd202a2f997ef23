//! Identity transformation shared by every scheme.
//!
//! Turns a [`UserRecord`] into the [`AuthorizedUser`] handed back to callers
//! and decides which usage pair (principal plus usage-identifier key) the
//! request is billed against.

use std::sync::Arc;

use gatekeeper_directory::{AppMetadata, UserRecord};
use serde::{Serialize, ser::SerializeStruct};
use serde_json::Value;

use crate::{config::AuthorizerConfig, credential::Scheme};

/// The principal and usage-identifier key a request is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageKey {
    /// Principal the usage is billed to.
    pub principal_id: String,
    /// Key used downstream for quota and billing.
    pub usage_identifier_key: String,
}

/// Attributes describing an authorized caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttributes {
    /// User identifier.
    pub id: String,
    /// Top-level email, falling back to the one stored in app metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// User metadata serialized as a JSON object.
    #[serde(rename = "userMetadataJson")]
    pub user_metadata: String,
    /// App metadata, without gateway credential fields, serialized as JSON.
    #[serde(rename = "appMetadataJson")]
    pub app_metadata: String,
    /// Feature flags enabled for the account.
    pub features: Vec<String>,
    /// Scheme the caller authenticated with.
    pub authorization_scheme: Scheme,
    /// Use-case label of the client key, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,
    /// External-id tag presented with the client key, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// An authorized caller with its resolved usage pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedUser {
    /// User identifier.
    pub id: String,
    /// Principal the usage is billed to.
    pub principal_id: String,
    /// Usage-identifier key; never empty.
    pub usage_identifier_key: String,
    /// Descriptive attributes.
    pub attributes: UserAttributes,
}

/// Outcome of authorizing a request.
///
/// A denial never carries a user. Serializes as
/// `{"isAllowed": bool, "user": {...}}`, with `user` omitted on denial.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationResult {
    /// The caller may proceed.
    Allowed(AuthorizedUser),
    /// Credentials were well formed but did not match any account.
    Denied,
}

impl AuthorizationResult {
    /// Returns `true` if the caller may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    /// Returns the authorized user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&AuthorizedUser> {
        match self {
            Self::Allowed(user) => Some(user),
            Self::Denied => None,
        }
    }
}

impl Serialize for AuthorizationResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let user = self.user();
        let mut state =
            serializer.serialize_struct("AuthorizationResult", 1 + usize::from(user.is_some()))?;
        state.serialize_field("isAllowed", &self.is_allowed())?;
        if let Some(user) = user {
            state.serialize_field("user", user)?;
        }
        state.end()
    }
}

/// Builds authorized users from directory records.
#[derive(Debug, Clone)]
pub struct IdentityTransformer {
    config: Arc<AuthorizerConfig>,
}

impl IdentityTransformer {
    /// Creates a transformer using the configured defaults and trial keys.
    #[must_use]
    pub fn new(config: Arc<AuthorizerConfig>) -> Self {
        Self { config }
    }

    /// The configured fallback usage pair.
    #[must_use]
    pub fn default_usage_key(&self) -> UsageKey {
        UsageKey {
            principal_id: self.config.default_principal_id().to_owned(),
            usage_identifier_key: self.config.default_usage_identifier_key().to_owned(),
        }
    }

    /// Picks the usage pair for a user.
    ///
    /// Trial gateway keys and users without a usage key get the default
    /// pair. Everyone else is billed to their own email (or id, when no
    /// email is known) under their own usage key.
    #[must_use]
    pub fn derive_usage_key(&self, user: &UserRecord) -> UsageKey {
        let on_trial = user
            .app_metadata
            .api_gateway_key_name
            .as_deref()
            .is_some_and(|name| self.config.is_trial_key(name));

        match user.app_metadata.usage_identifier_key() {
            Some(key) if !on_trial => UsageKey {
                principal_id: user.effective_email().unwrap_or(&user.user_id).to_owned(),
                usage_identifier_key: key.to_owned(),
            },
            _ => self.default_usage_key(),
        }
    }

    /// Produces the attributes for a user authenticated with `scheme`.
    #[must_use]
    pub fn attributes(&self, user: &UserRecord, scheme: Scheme) -> UserAttributes {
        UserAttributes {
            id: user.user_id.clone(),
            email: user.effective_email().map(str::to_owned),
            user_metadata: Value::Object(user.user_metadata.clone()).to_string(),
            app_metadata: app_metadata_json(&user.app_metadata.sanitized()),
            features: user.app_metadata.features.clone().unwrap_or_default(),
            authorization_scheme: scheme,
            use_case: None,
            external_id: None,
        }
    }

    /// Combines the user's attributes with a usage pair.
    #[must_use]
    pub fn authorize(&self, user: &UserRecord, scheme: Scheme, usage: UsageKey) -> AuthorizedUser {
        AuthorizedUser {
            id: user.user_id.clone(),
            principal_id: usage.principal_id,
            usage_identifier_key: usage.usage_identifier_key,
            attributes: self.attributes(user, scheme),
        }
    }
}

fn app_metadata_json(metadata: &AppMetadata) -> String {
    match serde_json::to_string(metadata) {
        Ok(json) => json,
        Err(error) => {
            tracing::warn!(%error, "app metadata could not be serialized");
            String::from("{}")
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::config::{BearerConfig, JwksConfig};

    fn transformer() -> IdentityTransformer {
        let config = AuthorizerConfig::builder()
            .default_principal_id("default-principal")
            .default_usage_identifier_key("default-usage")
            .bearer(
                BearerConfig::builder()
                    .audience("https://tenant.example.com/api/v2/")
                    .issuer("https://auth.example.com/")
                    .jwks(
                        JwksConfig::builder()
                            .uri("https://tenant.example.com/.well-known/jwks.json".parse().unwrap())
                            .build()
                            .unwrap(),
                    )
                    .build()
                    .unwrap(),
            )
            .trial_key_names(BTreeSet::from(["trial-key".to_owned()]))
            .build()
            .unwrap();
        IdentityTransformer::new(Arc::new(config))
    }

    fn user(metadata: AppMetadata) -> UserRecord {
        UserRecord::builder()
            .user_id("auth0|1")
            .email("dev@example.com")
            .email_verified(true)
            .app_metadata(metadata)
            .build()
    }

    #[test]
    fn test_own_usage_key() {
        let usage = transformer()
            .derive_usage_key(&user(AppMetadata::builder().usage_identifier_key("uk-1").build()));

        assert_eq!(usage.principal_id, "dev@example.com");
        assert_eq!(usage.usage_identifier_key, "uk-1");
    }

    #[test]
    fn test_trial_key_gets_default_pair() {
        let metadata = AppMetadata::builder()
            .usage_identifier_key("uk-1")
            .api_gateway_key_name("trial-key")
            .build();

        assert_eq!(transformer().derive_usage_key(&user(metadata)), transformer().default_usage_key());
    }

    #[test]
    fn test_empty_usage_key_gets_default_pair() {
        let usage =
            transformer().derive_usage_key(&user(AppMetadata::builder().usage_identifier_key("").build()));

        assert_eq!(usage.usage_identifier_key, "default-usage");
        assert_eq!(usage.principal_id, "default-principal");
    }

    #[test]
    fn test_principal_falls_back_to_user_id() {
        let record = UserRecord::builder()
            .user_id("auth0|no-email")
            .app_metadata(AppMetadata::builder().usage_identifier_key("uk-2").build())
            .build();

        assert_eq!(transformer().derive_usage_key(&record).principal_id, "auth0|no-email");
    }

    #[test]
    fn test_attributes_strip_gateway_fields() {
        let metadata = AppMetadata::builder()
            .api_key("$2b$04$secret")
            .api_gateway_key_id("gk-1")
            .api_gateway_key_name("gk-name")
            .api_key_modified_at("2024-01-01")
            .plan("pro")
            .features(vec!["streaming".to_owned()])
            .build();

        let attributes = transformer().attributes(&user(metadata), Scheme::Basic);
        let app: Value = serde_json::from_str(&attributes.app_metadata).unwrap();

        assert_eq!(app, json!({ "plan": "pro", "features": ["streaming"] }));
        assert_eq!(attributes.features, vec!["streaming".to_owned()]);
        assert_eq!(attributes.user_metadata, "{}");
        assert_eq!(attributes.authorization_scheme, Scheme::Basic);
    }

    #[test]
    fn test_email_falls_back_to_app_metadata() {
        let record = UserRecord::builder()
            .user_id("auth0|2")
            .app_metadata(AppMetadata::builder().email("meta@example.com").build())
            .build();

        let attributes = transformer().attributes(&record, Scheme::Bearer);
        assert_eq!(attributes.email.as_deref(), Some("meta@example.com"));
    }

    #[test]
    fn test_result_serialization() {
        let transformer = transformer();
        let record = user(AppMetadata::default());
        let allowed = AuthorizationResult::Allowed(transformer.authorize(
            &record,
            Scheme::ClientKey,
            transformer.default_usage_key(),
        ));

        let value = serde_json::to_value(&allowed).unwrap();
        assert_eq!(value["isAllowed"], json!(true));
        assert_eq!(value["user"]["principalId"], json!("default-principal"));
        assert_eq!(value["user"]["usageIdentifierKey"], json!("default-usage"));
        assert_eq!(value["user"]["attributes"]["authorizationScheme"], json!("client-key"));
        assert!(value["user"]["attributes"].get("useCase").is_none());

        assert_eq!(serde_json::to_value(AuthorizationResult::Denied).unwrap(), json!({ "isAllowed": false }));
    }
}
