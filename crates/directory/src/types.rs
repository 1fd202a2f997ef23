//! Records served by the user and client-key directories.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

/// Owner keys with this prefix denote an organization rather than a user.
pub const ORGANIZATION_OWNER_PREFIX: &str = "org_";

/// Application-level metadata attached to a user account.
///
/// Known fields are typed; anything else the identity provider stores is
/// kept in [`extra`](Self::extra) so it survives a round-trip into the
/// authorization attributes.
///
/// # Example
///
/// ```
/// use gatekeeper_directory::AppMetadata;
///
/// let metadata = AppMetadata::builder()
///     .api_key("$2b$10$...")
///     .usage_identifier_key("usage-123")
///     .features(vec!["streaming".to_owned()])
///     .build();
///
/// let sanitized = metadata.sanitized();
/// assert!(sanitized.api_key.is_none());
/// assert_eq!(sanitized.usage_identifier_key.as_deref(), Some("usage-123"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct AppMetadata {
    /// Hashed API key (bcrypt or Argon2 PHC string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub api_key: Option<String>,

    /// Key used downstream for billing and quota attribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub usage_identifier_key: Option<String>,

    /// Name of the API gateway key issued to this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub api_gateway_key_name: Option<String>,

    /// Identifier of the API gateway key issued to this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub api_gateway_key_id: Option<String>,

    /// When the API key was last rotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub api_key_modified_at: Option<String>,

    /// Feature flags enabled for the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,

    /// Billing plan name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub plan: Option<String>,

    /// Billing plan group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub stripe_plan_group: Option<String>,

    /// Billing product name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub stripe_product_name: Option<String>,

    /// Organization the account belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub org_id: Option<String>,

    /// Email stored in metadata, used when the top-level email is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub email: Option<String>,

    /// Any other metadata fields.
    #[serde(flatten)]
    #[builder(default)]
    pub extra: Map<String, Value>,
}

impl AppMetadata {
    /// Returns a copy without the gateway credential fields.
    ///
    /// Strips `api_key`, `api_gateway_key_id`, `api_gateway_key_name` and
    /// `api_key_modified_at`. Everything else is preserved.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            api_key: None,
            api_gateway_key_id: None,
            api_gateway_key_name: None,
            api_key_modified_at: None,
            ..self.clone()
        }
    }

    /// Returns the usage-identifier key if it is present and non-empty.
    #[must_use]
    pub fn usage_identifier_key(&self) -> Option<&str> {
        self.usage_identifier_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// A user account as served by a [`UserDirectory`](crate::UserDirectory).
///
/// # Example
///
/// ```
/// use gatekeeper_directory::{AppMetadata, UserRecord};
///
/// let user = UserRecord::builder()
///     .user_id("auth0|123")
///     .email("dev@example.com")
///     .email_verified(true)
///     .app_metadata(AppMetadata::builder().api_key("$2b$10$...").build())
///     .build();
///
/// assert!(user.accepts_api_key());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct UserRecord {
    /// Stable user identifier.
    #[builder(into)]
    pub user_id: String,

    /// Primary email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub email: Option<String>,

    /// Whether the account has been blocked.
    #[serde(default)]
    #[builder(default)]
    pub blocked: bool,

    /// Whether the email address has been verified.
    #[serde(default)]
    #[builder(default)]
    pub email_verified: bool,

    /// Metadata the user may edit.
    #[serde(default)]
    #[builder(default)]
    pub user_metadata: Map<String, Value>,

    /// Metadata managed by the application.
    #[serde(default)]
    #[builder(default)]
    pub app_metadata: AppMetadata,
}

impl UserRecord {
    /// Returns `true` if the account may authenticate with an API key.
    ///
    /// Requires a stored hashed key, an unblocked account and a verified
    /// email address.
    #[must_use]
    pub fn accepts_api_key(&self) -> bool {
        self.app_metadata.api_key.as_deref().is_some_and(|hash| !hash.is_empty())
            && !self.blocked
            && self.email_verified
    }

    /// Returns the top-level email, falling back to the one in app metadata.
    #[must_use]
    pub fn effective_email(&self) -> Option<&str> {
        self.email.as_deref().or(self.app_metadata.email.as_deref())
    }
}

/// A client key and the policy attached to it.
///
/// The key is secret material: it is zeroed on drop and never printed by
/// `Debug`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientKeyRecord {
    /// The opaque client key.
    pub key: Zeroizing<String>,

    /// Partition key of the owner: an organization id (`org_...`) or a user id.
    pub owner: String,

    /// Email of the owner, used to resolve organization-owned keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Organization the key was issued under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    /// Free-form label describing what the key is used for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,

    /// Origins allowed to present this key. `*` allows any origin.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

#[bon::bon]
impl ClientKeyRecord {
    /// Creates a record; the key is moved into zeroizing storage.
    #[builder]
    pub fn new(
        #[builder(into)] key: String,
        #[builder(into)] owner: String,
        #[builder(into)] email: Option<String>,
        #[builder(into)] org_id: Option<String>,
        #[builder(into)] use_case: Option<String>,
        #[builder(default)] allowed_domains: Vec<String>,
    ) -> Self {
        Self { key: Zeroizing::new(key), owner, email, org_id, use_case, allowed_domains }
    }

    /// Returns `true` if the owner key denotes an organization.
    #[must_use]
    pub fn owner_is_organization(&self) -> bool {
        self.owner.starts_with(ORGANIZATION_OWNER_PREFIX)
    }
}

impl std::fmt::Debug for ClientKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKeyRecord")
            .field("key", &"<redacted>")
            .field("owner", &self.owner)
            .field("email", &self.email)
            .field("org_id", &self.org_id)
            .field("use_case", &self.use_case)
            .field("allowed_domains", &self.allowed_domains)
            .finish()
    }
}
