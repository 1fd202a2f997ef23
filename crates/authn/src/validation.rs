//! JWT header validation.
//!
//! Runs on the unverified header before any key lookup, so a token with a
//! hostile algorithm or `kid` never reaches the key resolver.
//!
//! # Security
//!
//! - Only asymmetric algorithms (RS256, EdDSA) are accepted
//! - Symmetric algorithms and "none" are always rejected
//! - Key ids are bounded in length and character set

use crate::error::AuthError;

/// Forbidden JWT algorithms that are never accepted for security reasons.
///
/// - `none`: no signature at all
/// - `HS256`, `HS384`, `HS512`: symmetric, so a published public key could
///   be replayed as the shared secret
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms.
///
/// RS256 is what hosted identity providers publish in their key sets;
/// EdDSA covers Ed25519 keys.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256", "EdDSA"];

/// Maximum accepted length of a `kid` header.
pub const MAX_KID_LENGTH: usize = 256;

/// Validate a JWT algorithm name against security policy.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if the algorithm is forbidden
/// or not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use gatekeeper_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.iter().any(|forbidden| forbidden.eq_ignore_ascii_case(alg)) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{alg}' is not in accepted list"
        )));
    }

    Ok(())
}

/// Validate a `kid` header value before it is used as a cache key.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the id is empty, longer than
/// [`MAX_KID_LENGTH`], or contains whitespace or control characters.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::invalid_token("JWT header 'kid' is empty"));
    }
    if kid.len() > MAX_KID_LENGTH {
        return Err(AuthError::invalid_token(format!(
            "JWT header 'kid' exceeds {MAX_KID_LENGTH} bytes"
        )));
    }
    if kid.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(AuthError::invalid_token("JWT header 'kid' contains invalid characters"));
    }
    Ok(())
}
