//! JWT decoding and verification.
//!
//! Tokens are verified against an ordered list of [`IssuerTrial`]s so an
//! identity provider can move to a new issuer URL while tokens minted under
//! the old one stay valid until they expire.
//!
//! # Example
//!
//! ```no_run
//! use gatekeeper_authn::jwt::{IssuerTrial, decode_jwt_header, verify_with_trials};
//! use jsonwebtoken::DecodingKey;
//!
//! # fn example(token: &str, key: &DecodingKey) -> Result<(), Box<dyn std::error::Error>> {
//! let header = decode_jwt_header(token)?;
//! let trials = [
//!     IssuerTrial::new("https://tenant.example.com/api/v2/", "https://auth.example.com/"),
//!     IssuerTrial::new("https://tenant.example.com/api/v2/", "https://tenant.example.com/"),
//! ];
//! let claims = verify_with_trials(token, key, header.alg, &trials)?;
//! println!("subject: {:?}", claims.get("sub"));
//! # Ok(())
//! # }
//! ```

use gatekeeper_directory::{AppMetadata, UserRecord};
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation, decode, decode_header};
use serde_json::{Map, Value};

use crate::{config::BearerConfig, error::AuthError};

/// Verified JWT claims.
pub type Claims = Map<String, Value>;

/// One `(audience, issuer)` pair a token may be verified against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerTrial {
    /// Expected `aud` claim.
    pub audience: String,
    /// Expected `iss` claim.
    pub issuer: String,
}

impl IssuerTrial {
    /// Creates a trial.
    #[must_use]
    pub fn new(audience: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self { audience: audience.into(), issuer: issuer.into() }
    }

    /// Builds the trial list for a Bearer configuration.
    ///
    /// The configured issuer comes first; the deprecated issuer follows only
    /// when it differs.
    #[must_use]
    pub fn from_config(config: &BearerConfig) -> Vec<Self> {
        let mut trials = vec![Self::new(config.audience(), config.issuer())];
        if let Some(deprecated) = config.deprecated_issuer()
            && deprecated != config.issuer()
        {
            trials.push(Self::new(config.audience(), deprecated));
        }
        trials
    }
}

/// Decode JWT header without verification.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the header cannot be decoded.
pub fn decode_jwt_header(token: &str) -> Result<Header, AuthError> {
    decode_header(token).map_err(|e| AuthError::invalid_token(format!("Failed to decode JWT header: {e}")))
}

/// Name of an algorithm as it appears in the `alg` header.
#[must_use]
pub fn algorithm_name(algorithm: Algorithm) -> String {
    format!("{algorithm:?}")
}

/// Verify signature and claims, trying each issuer pair in order.
///
/// Each attempt checks the signature, `exp`, `aud` and `iss`. The first
/// success wins.
///
/// # Errors
///
/// - [`AuthError::TokenExpired`] if any attempt failed on expiration
/// - the last attempt's error otherwise
pub fn verify_with_trials(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    trials: &[IssuerTrial],
) -> Result<Claims, AuthError> {
    let mut expired = false;
    let mut last_error = None;

    for trial in trials {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[trial.audience.as_str()]);
        validation.set_issuer(&[trial.issuer.as_str()]);

        match decode::<Claims>(token, key, &validation) {
            Ok(data) => return Ok(data.claims),
            Err(err) => {
                let err = AuthError::from(err);
                tracing::debug!(issuer = %trial.issuer, error = %err, "issuer trial failed");
                expired |= matches!(err, AuthError::TokenExpired);
                last_error = Some(err);
            },
        }
    }

    if expired {
        return Err(AuthError::token_expired());
    }
    Err(last_error.unwrap_or_else(|| AuthError::invalid_token("no issuer configured")))
}

/// Builds a user record from verified claims.
///
/// `sub` becomes the user id. Claims under `namespace` are copied, prefix
/// stripped, into the app metadata. The top-level `email` claim wins over
/// the namespaced one.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if `sub` is missing or empty.
pub fn claims_to_user(claims: &Claims, namespace: &str) -> Result<UserRecord, AuthError> {
    let user_id = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| AuthError::invalid_token("JWT missing 'sub' claim"))?;

    let namespaced: Map<String, Value> = claims
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(namespace)
                .filter(|stripped| !stripped.is_empty())
                .map(|stripped| (stripped.to_owned(), value.clone()))
        })
        .collect();

    let app_metadata = match serde_json::from_value::<AppMetadata>(Value::Object(namespaced.clone())) {
        Ok(metadata) => metadata,
        Err(err) => {
            tracing::debug!(error = %err, "namespaced claims do not match app metadata shape");
            AppMetadata { extra: namespaced, ..AppMetadata::default() }
        },
    };

    let email = claims
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| app_metadata.email.clone());

    Ok(UserRecord {
        user_id: user_id.to_owned(),
        email,
        blocked: false,
        email_verified: claims.get("email_verified").and_then(Value::as_bool).unwrap_or(false),
        user_metadata: Map::new(),
        app_metadata,
    })
}
