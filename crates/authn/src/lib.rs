//! # Gatekeeper Authentication
//!
//! Multi-scheme authorizer for inbound HTTP requests.
//!
//! Given an `Authorization` header (and the caller's origin), [`Authorizer`]
//! decides whether the request may proceed and, if so, which identity and
//! usage-identifier key it is attributed to.
//!
//! This crate provides:
//! - **Credential parsing**: `Bearer`, `Basic` and `Client-Key` headers
//! - **Bearer**: JWT verification against a cached, rate-limited JWKS
//! - **Basic**: bcrypt / Argon2 API keys from a user directory
//! - **Client-Key**: opaque keys with per-key origin policies
//! - **Identity transformation**: one [`AuthorizationResult`] shape for all schemes
//!
//! ## Features
//!
//! - Only asymmetric algorithms (RS256, EdDSA) are accepted
//! - Symmetric algorithms (HS256, etc.) and `none` are explicitly rejected
//! - Secret material is zeroed on drop and redacted from `Debug`
//! - `failpoints`: fault injection around the key-set fetch
//! - `testutil`: key, token and fetcher helpers for tests
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gatekeeper_authn::{AuthRequest, Authorizer, config::AuthorizerConfig};
//! use gatekeeper_directory::{MemoryClientKeyDirectory, MemoryUserDirectory};
//!
//! # async fn example(headers: http::HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let authorizer = Authorizer::from_config(
//!     AuthorizerConfig::from_env()?,
//!     Arc::new(MemoryUserDirectory::new()),
//!     Arc::new(MemoryClientKeyDirectory::new()),
//! )?;
//!
//! match authorizer.authorize(&AuthRequest::from_headers(&headers)).await {
//!     Ok(result) => println!("{}", serde_json::to_string(&result)?),
//!     Err(err) => println!("rejected: {}", err.kind()),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Multi-scheme dispatch.
pub mod authorizer;
/// Basic scheme.
pub mod basic;
/// Bearer scheme.
pub mod bearer;
/// Client-Key scheme.
pub mod client_key;
/// Authorizer configuration.
pub mod config;
/// Request input.
pub mod context;
/// Authorization header parsing.
pub mod credential;
/// Authentication error types.
pub mod error;
/// Stored API key hash verification.
pub mod hashing;
/// Identity transformation and authorization results.
pub mod identity;
/// JWT decoding and verification.
pub mod jwt;
/// Signing-key resolution.
pub mod signing_key;
/// Shared test utilities.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
/// Algorithm validation.
pub mod validation;

// Re-export key types for convenience
pub use authorizer::{Authorizer, SchemeAuthorizer};
pub use config::AuthorizerConfig;
pub use context::AuthRequest;
pub use credential::{Credential, Scheme};
pub use error::{AuthError, AuthErrorKind, ConfigError, KeyResolverError, Result};
pub use identity::{AuthorizationResult, AuthorizedUser, IdentityTransformer, UsageKey, UserAttributes};
pub use signing_key::{HttpJwksFetcher, JwksFetcher, JwksKeyResolver, SigningKeyResolver, StaticJwksFetcher};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
