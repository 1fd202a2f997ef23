//! Authorizer configuration.
//!
//! [`AuthorizerConfig`] carries everything the schemes need that is not
//! request data: the default usage pair, the JWT trust settings, the trial
//! key list and the first-party origins. It can be built in code with a
//! validating builder, deserialized from any serde format, or read from the
//! process environment. All three paths reject invalid values, so a
//! constructed configuration always holds non-empty defaults.

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Default prefix of custom claims copied into app metadata.
pub const DEFAULT_CLAIM_NAMESPACE: &str = "https://d-id.com/";

/// Default ceiling on live key-set fetches per minute.
pub const DEFAULT_JWKS_REQUESTS_PER_MINUTE: u32 = 10;

/// Default number of verification keys kept in memory.
pub const DEFAULT_JWKS_CACHE_CAPACITY: u64 = 1_000;

/// Default timeout for a single key-set fetch.
pub const DEFAULT_JWKS_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn default_claim_namespace() -> String {
    DEFAULT_CLAIM_NAMESPACE.to_owned()
}

fn default_requests_per_minute() -> u32 {
    DEFAULT_JWKS_REQUESTS_PER_MINUTE
}

fn default_cache_capacity() -> u64 {
    DEFAULT_JWKS_CACHE_CAPACITY
}

fn default_request_timeout() -> Duration {
    DEFAULT_JWKS_REQUEST_TIMEOUT
}

/// Where and how often verification keys are fetched.
///
/// # Example
///
/// ```
/// use gatekeeper_authn::config::JwksConfig;
///
/// let jwks = JwksConfig::builder()
///     .uri("https://tenant.example.com/.well-known/jwks.json".parse()?)
///     .requests_per_minute(5)
///     .build()?;
/// assert_eq!(jwks.requests_per_minute(), 5);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JwksConfigRepr")]
pub struct JwksConfig {
    /// Key-set endpoint.
    pub(crate) uri: Url,

    /// Maximum live fetches per minute.
    pub(crate) requests_per_minute: u32,

    /// Maximum cached verification keys.
    pub(crate) cache_capacity: u64,

    /// Timeout for one fetch.
    #[serde(with = "humantime_serde")]
    pub(crate) request_timeout: Duration,
}

/// Wire form of [`JwksConfig`], validated on conversion.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JwksConfigRepr {
    uri: Url,
    #[serde(default = "default_requests_per_minute")]
    requests_per_minute: u32,
    #[serde(default = "default_cache_capacity")]
    cache_capacity: u64,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    request_timeout: Duration,
}

impl TryFrom<JwksConfigRepr> for JwksConfig {
    type Error = ConfigError;

    fn try_from(repr: JwksConfigRepr) -> Result<Self, Self::Error> {
        let config = Self {
            uri: repr.uri,
            requests_per_minute: repr.requests_per_minute,
            cache_capacity: repr.cache_capacity,
            request_timeout: repr.request_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

#[bon::bon]
impl JwksConfig {
    /// Creates a new key-set configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `requests_per_minute` or `cache_capacity` is zero.
    #[builder]
    pub fn new(
        uri: Url,
        #[builder(default = DEFAULT_JWKS_REQUESTS_PER_MINUTE)] requests_per_minute: u32,
        #[builder(default = DEFAULT_JWKS_CACHE_CAPACITY)] cache_capacity: u64,
        #[builder(default = DEFAULT_JWKS_REQUEST_TIMEOUT)] request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { uri, requests_per_minute, cache_capacity, request_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the builder enforces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero rate or capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requests_per_minute == 0 {
            return Err(ConfigError::invalid("jwks.requests_per_minute", "must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid("jwks.cache_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Returns the key-set endpoint.
    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Returns the live-fetch ceiling per minute.
    #[must_use]
    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Returns the cache capacity.
    #[must_use]
    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    /// Returns the per-fetch timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// JWT trust settings for the Bearer scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BearerConfigRepr")]
pub struct BearerConfig {
    /// Expected `aud` claim.
    pub(crate) audience: String,

    /// Primary expected `iss` claim.
    pub(crate) issuer: String,

    /// Issuer still accepted while tokens from it remain in circulation.
    pub(crate) deprecated_issuer: Option<String>,

    /// Prefix of custom claims copied into app metadata.
    pub(crate) claim_namespace: String,

    /// Key-set settings.
    pub(crate) jwks: JwksConfig,
}

/// Wire form of [`BearerConfig`], validated on conversion.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BearerConfigRepr {
    audience: String,
    issuer: String,
    #[serde(default)]
    deprecated_issuer: Option<String>,
    #[serde(default = "default_claim_namespace")]
    claim_namespace: String,
    jwks: JwksConfig,
}

impl TryFrom<BearerConfigRepr> for BearerConfig {
    type Error = ConfigError;

    fn try_from(repr: BearerConfigRepr) -> Result<Self, Self::Error> {
        let config = Self {
            audience: repr.audience,
            issuer: repr.issuer,
            deprecated_issuer: repr.deprecated_issuer,
            claim_namespace: repr.claim_namespace,
            jwks: repr.jwks,
        };
        config.validate()?;
        Ok(config)
    }
}

#[bon::bon]
impl BearerConfig {
    /// Creates a new Bearer configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the audience, issuer or claim namespace is empty.
    #[builder]
    pub fn new(
        #[builder(into)] audience: String,
        #[builder(into)] issuer: String,
        #[builder(into)] deprecated_issuer: Option<String>,
        #[builder(into, default = DEFAULT_CLAIM_NAMESPACE.to_owned())] claim_namespace: String,
        jwks: JwksConfig,
    ) -> Result<Self, ConfigError> {
        let config = Self { audience, issuer, deprecated_issuer, claim_namespace, jwks };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the builder enforces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audience.is_empty() {
            return Err(ConfigError::invalid("bearer.audience", "cannot be empty"));
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::invalid("bearer.issuer", "cannot be empty"));
        }
        if self.deprecated_issuer.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::invalid("bearer.deprecated_issuer", "cannot be empty"));
        }
        if self.claim_namespace.is_empty() {
            return Err(ConfigError::invalid("bearer.claim_namespace", "cannot be empty"));
        }
        self.jwks.validate()
    }

    /// Returns the expected audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Returns the primary issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the deprecated issuer, if configured.
    #[must_use]
    pub fn deprecated_issuer(&self) -> Option<&str> {
        self.deprecated_issuer.as_deref()
    }

    /// Returns the custom claim namespace.
    #[must_use]
    pub fn claim_namespace(&self) -> &str {
        &self.claim_namespace
    }

    /// Returns the key-set settings.
    #[must_use]
    pub fn jwks(&self) -> &JwksConfig {
        &self.jwks
    }
}

/// Top-level authorizer configuration.
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
///
/// use gatekeeper_authn::config::{AuthorizerConfig, BearerConfig, JwksConfig};
///
/// let config = AuthorizerConfig::builder()
///     .default_principal_id("default-principal")
///     .default_usage_identifier_key("default-usage-key")
///     .bearer(
///         BearerConfig::builder()
///             .audience("https://tenant.example.com/api/v2/")
///             .issuer("https://auth.example.com/")
///             .deprecated_issuer("https://tenant.example.com/")
///             .jwks(
///                 JwksConfig::builder()
///                     .uri("https://tenant.example.com/.well-known/jwks.json".parse()?)
///                     .build()?,
///             )
///             .build()?,
///     )
///     .trial_key_names(BTreeSet::from(["trial-key".to_owned()]))
///     .first_party_origins(BTreeSet::from(["studio.example.com".to_owned()]))
///     .build()?;
///
/// assert!(config.is_trial_key("trial-key"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AuthorizerConfigRepr")]
pub struct AuthorizerConfig {
    /// Principal assigned when a caller has no usage key of its own.
    pub(crate) default_principal_id: String,

    /// Usage-identifier key assigned when a caller has none of its own.
    pub(crate) default_usage_identifier_key: String,

    /// Bearer scheme settings.
    pub(crate) bearer: BearerConfig,

    /// Gateway key names that never grant a user-specific usage key.
    pub(crate) trial_key_names: BTreeSet<String>,

    /// Hostnames of first-party front ends that bypass client-key origin lists.
    pub(crate) first_party_origins: BTreeSet<String>,
}

/// Wire form of [`AuthorizerConfig`], validated on conversion.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthorizerConfigRepr {
    default_principal_id: String,
    default_usage_identifier_key: String,
    bearer: BearerConfig,
    #[serde(default)]
    trial_key_names: BTreeSet<String>,
    #[serde(default)]
    first_party_origins: BTreeSet<String>,
}

impl TryFrom<AuthorizerConfigRepr> for AuthorizerConfig {
    type Error = ConfigError;

    fn try_from(repr: AuthorizerConfigRepr) -> Result<Self, Self::Error> {
        let config = Self {
            default_principal_id: repr.default_principal_id,
            default_usage_identifier_key: repr.default_usage_identifier_key,
            bearer: repr.bearer,
            trial_key_names: repr.trial_key_names,
            first_party_origins: repr.first_party_origins,
        };
        config.validate()?;
        Ok(config)
    }
}

#[bon::bon]
impl AuthorizerConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a default is empty or the Bearer settings are
    /// invalid.
    #[builder]
    pub fn new(
        #[builder(into)] default_principal_id: String,
        #[builder(into)] default_usage_identifier_key: String,
        bearer: BearerConfig,
        #[builder(default)] trial_key_names: BTreeSet<String>,
        #[builder(default)] first_party_origins: BTreeSet<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            default_principal_id,
            default_usage_identifier_key,
            bearer,
            trial_key_names,
            first_party_origins,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the builder and deserialization enforce.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_principal_id.is_empty() {
            return Err(ConfigError::invalid("default_principal_id", "cannot be empty"));
        }
        if self.default_usage_identifier_key.is_empty() {
            return Err(ConfigError::invalid("default_usage_identifier_key", "cannot be empty"));
        }
        self.bearer.validate()
    }

    /// Reads the configuration from the process environment.
    ///
    /// | Variable                   | Meaning                                   |
    /// |----------------------------|-------------------------------------------|
    /// | `AUTH_DOMAIN`              | Tenant domain (required)                  |
    /// | `AUTH_ISSUER`              | Primary issuer (required)                 |
    /// | `AUTH_AUDIENCE`            | Audience (default `https://{domain}/api/v2/`) |
    /// | `DEFAULT_PRINCIPAL_ID`     | Default principal (required)              |
    /// | `DEFAULT_IDENTIFIER_KEY`   | Default usage key (required)              |
    /// | `TRIAL_KEY_NAMES`          | Comma-separated trial key names           |
    /// | `FIRST_PARTY_ORIGINS`      | Comma-separated first-party hostnames     |
    /// | `JWKS_REQUESTS_PER_MINUTE` | Live-fetch ceiling (default 10)           |
    ///
    /// The key-set endpoint is `https://{domain}/.well-known/jwks.json` and
    /// the deprecated issuer is `https://{domain}/`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is
    /// invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name).filter(|value| !value.trim().is_empty()).ok_or(ConfigError::Missing { name })
        };
        let list = |name: &str| -> BTreeSet<String> {
            lookup(name)
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default()
        };

        let domain = required("AUTH_DOMAIN")?;
        let domain = domain.trim().trim_end_matches('/');
        let jwks_uri = Url::parse(&format!("https://{domain}/.well-known/jwks.json"))
            .map_err(|e| ConfigError::invalid("AUTH_DOMAIN", e.to_string()))?;
        let requests_per_minute = match lookup("JWKS_REQUESTS_PER_MINUTE") {
            Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::invalid("JWKS_REQUESTS_PER_MINUTE", e.to_string())
            })?,
            None => DEFAULT_JWKS_REQUESTS_PER_MINUTE,
        };

        let bearer = BearerConfig::builder()
            .audience(
                lookup("AUTH_AUDIENCE").unwrap_or_else(|| format!("https://{domain}/api/v2/")),
            )
            .issuer(required("AUTH_ISSUER")?)
            .deprecated_issuer(format!("https://{domain}/"))
            .jwks(JwksConfig::builder().uri(jwks_uri).requests_per_minute(requests_per_minute).build()?)
            .build()?;

        Self::builder()
            .default_principal_id(required("DEFAULT_PRINCIPAL_ID")?)
            .default_usage_identifier_key(required("DEFAULT_IDENTIFIER_KEY")?)
            .bearer(bearer)
            .trial_key_names(list("TRIAL_KEY_NAMES"))
            .first_party_origins(list("FIRST_PARTY_ORIGINS"))
            .build()
    }

    /// Returns the default principal id.
    #[must_use]
    pub fn default_principal_id(&self) -> &str {
        &self.default_principal_id
    }

    /// Returns the default usage-identifier key.
    #[must_use]
    pub fn default_usage_identifier_key(&self) -> &str {
        &self.default_usage_identifier_key
    }

    /// Returns the Bearer settings.
    #[must_use]
    pub fn bearer(&self) -> &BearerConfig {
        &self.bearer
    }

    /// Returns `true` if `name` is a configured trial key name.
    #[must_use]
    pub fn is_trial_key(&self, name: &str) -> bool {
        self.trial_key_names.contains(name)
    }

    /// Returns `true` if `hostname` belongs to a first-party front end.
    #[must_use]
    pub fn is_first_party_origin(&self, hostname: &str) -> bool {
        self.first_party_origins.contains(hostname)
    }
}
