//! Authorization error types.
//!
//! [`AuthError`] covers every way a request can be rejected by raising an
//! error. A well-formed credential that matches no principal is not an error;
//! it is [`AuthorizationResult::Denied`](crate::AuthorizationResult::Denied).
//!
//! Callers map errors to transport decisions through [`AuthError::kind`] and
//! separate infrastructure trouble from rejected credentials with
//! [`AuthError::is_collaborator_failure`].

use std::time::Duration;

use gatekeeper_directory::{BoxError, DirectoryError};
use serde::Serialize;
use thiserror::Error;

/// Authorization errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. New variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No `Authorization` header was supplied.
    #[error("Missing authorization header")]
    MissingAuthorization,

    /// The header matches none of the supported scheme prefixes.
    #[error("Unknown authorization scheme")]
    UnknownScheme,

    /// The header matches a scheme prefix but its payload is malformed.
    #[error("Malformed credential: {message}")]
    MalformedCredential {
        /// What was wrong with the credential. Never contains secret material.
        message: String,
    },

    /// The bearer token is malformed or failed verification.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Why the token was rejected.
        message: String,
    },

    /// The token header names an algorithm outside the accepted set.
    #[error("Unsupported algorithm: {message}")]
    UnsupportedAlgorithm {
        /// Description of the rejected algorithm.
        message: String,
    },

    /// The bearer token is past its expiration time.
    #[error("Token expired")]
    TokenExpired,

    /// The token's `kid` could not be resolved to a verification key.
    ///
    /// Classified as [`AuthErrorKind::InvalidToken`]; the resolver error is
    /// kept as the source so logs can tell an unknown key from an outage.
    #[error("Signing key unavailable for kid '{kid}'")]
    KeyResolution {
        /// Key ID from the token header.
        kid: String,
        /// Why the resolver failed.
        #[source]
        source: KeyResolverError,
    },

    /// The client key is unknown or does not match its record.
    #[error("Invalid client key")]
    InvalidClientKey,

    /// The caller's origin is not allowed to use the client key.
    #[error("Origin not allowed: {}", origin.as_deref().unwrap_or("<none>"))]
    OriginNotAllowed {
        /// The origin supplied by the caller, if any.
        origin: Option<String>,
    },

    /// A user or client-key directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(
        /// The underlying directory error.
        #[source]
        DirectoryError,
    ),

    /// The authorizer could not finish a check it started, such as a hash
    /// verification task that panicked.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// Errors produced by a [`SigningKeyResolver`](crate::signing_key::SigningKeyResolver).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum KeyResolverError {
    /// No key with this id is published.
    #[error("Signing key not found: {kid}")]
    NotFound {
        /// Key ID that was not found.
        kid: String,
    },

    /// The live-fetch budget is exhausted.
    #[error("Signing key refresh rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Time until the next fetch is permitted.
        retry_after: Duration,
    },

    /// The key set could not be fetched or decoded.
    #[error("Key set fetch failed: {message}")]
    Fetch {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// A published key could not be turned into a verification key.
    #[error("Invalid signing key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },
}

impl KeyResolverError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kid: impl Into<String>) -> Self {
        Self::NotFound { kid: kid.into() }
    }

    /// Creates a new `Fetch` error with a message only.
    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch { message: message.into(), source: None }
    }

    /// Creates a new `Fetch` error with a message and source error.
    #[must_use]
    pub fn fetch_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fetch { message: message.into(), source: Some(std::sync::Arc::new(source)) }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey { message: message.into() }
    }
}

/// Stable classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthErrorKind {
    /// No header at all.
    MissingAuthorization,
    /// Header present, no known scheme prefix.
    UnknownScheme,
    /// Scheme matched, structure invalid.
    MalformedCredential,
    /// Bearer token failed decoding, verification or key resolution.
    InvalidToken,
    /// Bearer token expired.
    TokenExpired,
    /// Unknown or mismatched client key.
    InvalidClientKey,
    /// Client key presented from a disallowed origin.
    OriginNotAllowed,
    /// A directory backend or an internal task failed.
    CollaboratorFailure,
}

impl AuthErrorKind {
    /// Returns the kind as a static string, for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingAuthorization => "MISSING_AUTHORIZATION",
            Self::UnknownScheme => "UNKNOWN_SCHEME",
            Self::MalformedCredential => "MALFORMED_CREDENTIAL",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidClientKey => "INVALID_CLIENT_KEY",
            Self::OriginNotAllowed => "ORIGIN_NOT_ALLOWED",
            Self::CollaboratorFailure => "COLLABORATOR_FAILURE",
        }
    }
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthError {
    /// Creates a new `MalformedCredential` error.
    #[must_use]
    pub fn malformed_credential(message: impl Into<String>) -> Self {
        Self::MalformedCredential { message: message.into() }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken { message: message.into() }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { message: message.into() }
    }

    /// Creates a new `TokenExpired` error.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::TokenExpired
    }

    /// Creates a new `KeyResolution` error.
    #[must_use]
    pub fn key_resolution(kid: impl Into<String>, source: KeyResolverError) -> Self {
        Self::KeyResolution { kid: kid.into(), source }
    }

    /// Creates a new `OriginNotAllowed` error.
    #[must_use]
    pub fn origin_not_allowed(origin: Option<&str>) -> Self {
        Self::OriginNotAllowed { origin: origin.map(str::to_owned) }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Returns the stable classification of this error.
    #[must_use]
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::MissingAuthorization => AuthErrorKind::MissingAuthorization,
            Self::UnknownScheme => AuthErrorKind::UnknownScheme,
            Self::MalformedCredential { .. } => AuthErrorKind::MalformedCredential,
            Self::InvalidToken { .. }
            | Self::UnsupportedAlgorithm { .. }
            | Self::KeyResolution { .. } => AuthErrorKind::InvalidToken,
            Self::TokenExpired => AuthErrorKind::TokenExpired,
            Self::InvalidClientKey => AuthErrorKind::InvalidClientKey,
            Self::OriginNotAllowed { .. } => AuthErrorKind::OriginNotAllowed,
            Self::Directory(_) | Self::Internal { .. } => AuthErrorKind::CollaboratorFailure,
        }
    }

    /// Returns `true` when the rejection was caused by a failing collaborator
    /// rather than by the credential itself.
    ///
    /// Directory and internal failures always qualify. Key-resolution failures qualify
    /// unless the key set was reachable and simply lacks the `kid`.
    #[must_use]
    pub fn is_collaborator_failure(&self) -> bool {
        match self {
            Self::Directory(_) | Self::Internal { .. } => true,
            Self::KeyResolution { source, .. } => {
                !matches!(source, KeyResolverError::NotFound { .. })
            },
            _ => false,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::invalid_token("signature verification failed"),
            ErrorKind::InvalidAudience => AuthError::invalid_token("audience validation failed"),
            ErrorKind::InvalidIssuer => AuthError::invalid_token("issuer validation failed"),
            ErrorKind::ImmatureSignature => AuthError::invalid_token("token not yet valid"),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::invalid_token(format!("missing required claim '{claim}'"))
            },
            ErrorKind::InvalidAlgorithm => {
                AuthError::unsupported_algorithm("algorithm does not match the signing key")
            },
            ErrorKind::InvalidToken => AuthError::invalid_token("invalid JWT structure"),
            _ => AuthError::invalid_token(format!("JWT error: {err}")),
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        AuthError::Directory(err)
    }
}

/// Result type alias for authorization operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("Missing configuration value: {name}")]
    Missing {
        /// Name of the setting.
        name: &'static str,
    },

    /// A setting was provided but is invalid.
    #[error("Invalid configuration value for {name}: {message}")]
    Invalid {
        /// Name of the setting.
        name: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// The key-set HTTP client could not be built from the settings.
    #[error("Key-set client setup failed: {0}")]
    KeySetClient(
        /// The underlying resolver error.
        #[source]
        KeyResolverError,
    ),
}

impl ConfigError {
    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { name, message: message.into() }
    }
}
