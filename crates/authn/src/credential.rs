//! Credential parsing for the `Authorization` header.
//!
//! Three schemes are recognised by a case-sensitive prefix match:
//!
//! | Prefix        | Payload                                            |
//! |---------------|----------------------------------------------------|
//! | `Bearer `     | JWT compact serialization                          |
//! | `Basic `      | `base64url(base64url(username):apiKey)` or the inner form |
//! | `Client-Key ` | `key[.externalId]`                                 |
//!
//! Secret material is held in [`Zeroizing`] buffers and redacted from
//! `Debug` output.
//!
//! # Example
//!
//! ```
//! use gatekeeper_authn::credential::{BasicCredential, Credential};
//!
//! let header = BasicCredential::encode("dev@example.com", "s3cret");
//! let Credential::Basic(basic) = Credential::parse(&header)? else {
//!     unreachable!()
//! };
//! assert_eq!(basic.username(), "dev@example.com");
//! assert_eq!(basic.api_key(), "s3cret");
//! # Ok::<(), gatekeeper_authn::AuthError>(())
//! ```

use std::borrow::Cow;

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::URL_SAFE_NO_PAD},
};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// URL-safe decoder that accepts padded and unpadded input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Standard-alphabet decoder, for clients that send `+` and `/`.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Authorization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    /// Signed JWT.
    Bearer,
    /// Username plus API key.
    Basic,
    /// Opaque client key with an origin policy.
    ClientKey,
}

impl Scheme {
    /// All schemes, in prefix-matching order.
    pub const ALL: [Scheme; 3] = [Scheme::Bearer, Scheme::Basic, Scheme::ClientKey];

    /// Returns the header prefix for this scheme, including the trailing space.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Bearer => "Bearer ",
            Self::Basic => "Basic ",
            Self::ClientKey => "Client-Key ",
        }
    }

    /// Returns the tag recorded in the authorization attributes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
            Self::Basic => "basic",
            Self::ClientKey => "client-key",
        }
    }

    /// Splits a raw header into its scheme and payload.
    ///
    /// Returns `None` if no scheme prefix matches.
    #[must_use]
    pub fn detect(header: &str) -> Option<(Scheme, &str)> {
        Self::ALL
            .into_iter()
            .find_map(|scheme| header.strip_prefix(scheme.prefix()).map(|rest| (scheme, rest)))
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential extracted from the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Bearer <jwt>`.
    Bearer(BearerToken),
    /// `Basic <blob>`.
    Basic(BasicCredential),
    /// `Client-Key <key>[.<externalId>]`.
    ClientKey(ClientKeyCredential),
}

impl Credential {
    /// Parses a raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnknownScheme`] if no scheme prefix matches
    /// - [`AuthError::MalformedCredential`] if the payload cannot be parsed
    pub fn parse(header: &str) -> Result<Self> {
        let (scheme, payload) = Scheme::detect(header).ok_or(AuthError::UnknownScheme)?;
        match scheme {
            Scheme::Bearer => BearerToken::parse(payload).map(Self::Bearer),
            Scheme::Basic => BasicCredential::parse(payload).map(Self::Basic),
            Scheme::ClientKey => ClientKeyCredential::parse(payload).map(Self::ClientKey),
        }
    }

    /// Returns the scheme this credential was presented with.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Bearer(_) => Scheme::Bearer,
            Self::Basic(_) => Scheme::Basic,
            Self::ClientKey(_) => Scheme::ClientKey,
        }
    }
}

/// A bearer token in JWT compact serialization.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(Zeroizing<String>);

impl BearerToken {
    fn parse(payload: &str) -> Result<Self> {
        let token = payload.trim();
        if token.is_empty() {
            return Err(AuthError::malformed_credential("bearer token is empty"));
        }
        Ok(Self(Zeroizing::new(token.to_owned())))
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Username and plaintext API key from a `Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredential {
    username: String,
    api_key: Zeroizing<String>,
}

impl BasicCredential {
    /// Parses the payload after the `Basic ` prefix.
    ///
    /// The payload is either the full blob `base64url(encodedUsername:apiKey)`
    /// or the inner `encodedUsername:apiKey` form; a payload without `:` is
    /// treated as the blob and decoded first. The text before the first `:`
    /// is base64url-decoded into the username. When it is not valid
    /// base64url, or decodes to something other than printable UTF-8, it is
    /// taken verbatim.
    fn parse(payload: &str) -> Result<Self> {
        let payload = payload.trim();
        let normalized: Cow<'_, str> = if payload.contains(':') {
            Cow::Borrowed(payload)
        } else {
            let bytes = decode_base64url(payload)
                .ok_or_else(|| AuthError::malformed_credential("basic credential is not base64"))?;
            let text = String::from_utf8(bytes)
                .map_err(|_| AuthError::malformed_credential("basic credential is not UTF-8"))?;
            Cow::Owned(text)
        };

        let (encoded_username, api_key) = normalized.split_once(':').ok_or_else(|| {
            AuthError::malformed_credential("basic credential must be 'username:apiKey'")
        })?;
        if encoded_username.is_empty() {
            return Err(AuthError::malformed_credential("username is empty"));
        }
        if api_key.is_empty() {
            return Err(AuthError::malformed_credential("api key is empty"));
        }

        Ok(Self {
            username: decode_username(encoded_username),
            api_key: Zeroizing::new(api_key.to_owned()),
        })
    }

    /// Encodes a full `Basic` header value for the given pair.
    ///
    /// Produces `Basic base64url(base64url(username):apiKey)`, which
    /// [`Credential::parse`] turns back into the same pair.
    #[must_use]
    pub fn encode(username: &str, api_key: &str) -> String {
        let inner = Zeroizing::new(format!("{}:{api_key}", URL_SAFE_NO_PAD.encode(username)));
        format!("{}{}", Scheme::Basic.prefix(), URL_SAFE_NO_PAD.encode(inner.as_bytes()))
    }

    /// Returns the username (an email address for API-key accounts).
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the plaintext API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for BasicCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredential")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Client key and optional external-id tag from a `Client-Key` header.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientKeyCredential {
    key: Zeroizing<String>,
    external_id: Option<String>,
}

impl ClientKeyCredential {
    /// Parses `key[.externalId]`. Segments after the second `.` are ignored.
    fn parse(payload: &str) -> Result<Self> {
        let mut segments = payload.trim().split('.');
        let key = segments.next().unwrap_or_default();
        if key.is_empty() {
            return Err(AuthError::malformed_credential("client key is empty"));
        }
        let external_id = segments.next().filter(|id| !id.is_empty()).map(str::to_owned);

        Ok(Self { key: Zeroizing::new(key.to_owned()), external_id })
    }

    /// Returns the opaque client key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the external-id tag, if one was supplied.
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// Returns a log-safe prefix of the key.
    #[must_use]
    pub fn key_hint(&self) -> String {
        let prefix: String = self.key.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl std::fmt::Debug for ClientKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKeyCredential")
            .field("key", &self.key_hint())
            .field("external_id", &self.external_id)
            .finish()
    }
}

fn decode_base64url(input: &str) -> Option<Vec<u8>> {
    URL_SAFE_LENIENT.decode(input).or_else(|_| STANDARD_LENIENT.decode(input)).ok()
}

fn decode_username(encoded: &str) -> String {
    decode_base64url(encoded)
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|decoded| !decoded.is_empty() && !decoded.chars().any(char::is_control))
        .unwrap_or_else(|| encoded.to_owned())
}
