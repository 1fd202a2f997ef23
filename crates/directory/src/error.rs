//! Directory error types and result alias.
//!
//! Every directory backend maps its internal failures to [`DirectoryError`].
//! The authorizer treats all of these as collaborator failures, distinct from
//! a credential that was simply rejected.
//!
//! # Example
//!
//! ```
//! use gatekeeper_directory::{DirectoryError, DirectoryResult};
//!
//! fn lookup(id: &str) -> DirectoryResult<String> {
//!     Err(DirectoryError::not_found(id))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A shareable boxed error for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur while reading a user or client-key directory.
///
/// Lookups that simply find nothing return `Ok(None)` or an empty list;
/// [`DirectoryError::NotFound`] is reserved for backends that can only
/// signal absence through an error.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum DirectoryError {
    /// The requested record does not exist.
    #[error("Record not found: {key}")]
    NotFound {
        /// The id, email or key that was looked up.
        key: String,
    },

    /// The directory backend could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// A stored record could not be decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the decoding failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// Backend-specific failure that fits no other category.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The lookup exceeded the backend's time limit.
    #[error("Operation timeout")]
    Timeout,
}

impl DirectoryError {
    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` for [`DirectoryError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Lookup helpers for [`DirectoryResult`].
pub trait DirectoryResultExt<T> {
    /// Folds [`DirectoryError::NotFound`] into an empty lookup (`None` or an
    /// empty list). Every other error is kept.
    ///
    /// # Errors
    ///
    /// Returns the original error unless it is `NotFound`.
    fn or_absent(self) -> DirectoryResult<T>;
}

impl<T: Default> DirectoryResultExt<T> for DirectoryResult<T> {
    fn or_absent(self) -> DirectoryResult<T> {
        match self {
            Err(err) if err.is_not_found() => Ok(T::default()),
            other => other,
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_with_source("failed to decode directory record", err)
    }
}
