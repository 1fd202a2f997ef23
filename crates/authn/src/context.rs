//! Request-scoped input to the authorizer.

use http::HeaderMap;
use zeroize::Zeroizing;

/// Header carrying the caller's correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-did-correlation-id";

/// Header some clients send instead of `Origin`.
pub const X_ORIGIN_HEADER: &str = "x-origin";

/// The parts of an inbound request the authorizer looks at.
///
/// Immutable once built and passed explicitly to
/// [`Authorizer::authorize`](crate::Authorizer::authorize); nothing about a
/// request is stored in shared state.
///
/// # Example
///
/// ```
/// use gatekeeper_authn::AuthRequest;
///
/// let request = AuthRequest::new("Client-Key abc123")
///     .with_origin("https://app.example.com")
///     .with_correlation_id("req-42");
///
/// assert_eq!(request.origin(), Some("https://app.example.com"));
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthRequest {
    authorization: Option<Zeroizing<String>>,
    origin: Option<String>,
    correlation_id: Option<String>,
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = self.authorization().map(|header| {
            crate::credential::Scheme::detect(header).map_or("<unknown>", |(scheme, _)| scheme.as_str())
        });
        f.debug_struct("AuthRequest")
            .field("authorization", &scheme)
            .field("origin", &self.origin)
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

impl AuthRequest {
    /// Creates a request with the given `Authorization` header value.
    #[must_use]
    pub fn new(authorization: impl Into<String>) -> Self {
        Self { authorization: Some(Zeroizing::new(authorization.into())), ..Self::default() }
    }

    /// Creates a request without an `Authorization` header.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Extracts the request from HTTP headers.
    ///
    /// Reads `authorization`, `origin` (falling back to `x-origin`) and
    /// `x-did-correlation-id`. Header names are case-insensitive; values
    /// that are not visible ASCII, or are empty, are ignored. The
    /// `Authorization` value is kept verbatim so a scheme prefix with an
    /// empty payload still parses as that scheme.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let raw = |name: &str| {
            headers.get(name).and_then(|value| value.to_str().ok()).filter(|value| !value.is_empty())
        };
        let read = |name: &str| {
            raw(name).map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
        };

        Self {
            authorization: raw(http::header::AUTHORIZATION.as_str())
                .map(|value| Zeroizing::new(value.to_owned())),
            origin: read(http::header::ORIGIN.as_str()).or_else(|| read(X_ORIGIN_HEADER)),
            correlation_id: read(CORRELATION_ID_HEADER),
        }
    }

    /// Sets the caller's origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the correlation id used in log fields.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Returns the raw `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_ref().map(|header| header.as_str())
    }

    /// Returns the caller's origin.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}
