//! Verification of stored API key hashes.
//!
//! Supports bcrypt (`$2a$`, `$2b$`, `$2y$`) and Argon2 PHC strings
//! (`$argon2id$`, `$argon2i$`, `$argon2d$`). Verification is CPU bound; the
//! Basic scheme runs it on the blocking pool.

use argon2::{Argon2, PasswordHash, PasswordVerifier};

/// Returns `true` if `api_key` matches `stored_hash`.
///
/// A hash in an unknown format, or one that fails to parse, is a non-match.
#[must_use]
pub fn verify_api_key(api_key: &str, stored_hash: &str) -> bool {
    if stored_hash.starts_with("$argon2") {
        return match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default().verify_password(api_key.as_bytes(), &parsed).is_ok(),
            Err(error) => {
                tracing::warn!(%error, "stored argon2 hash is malformed");
                false
            },
        };
    }

    if ["$2a$", "$2b$", "$2y$"].iter().any(|prefix| stored_hash.starts_with(prefix)) {
        return match bcrypt::verify(api_key, stored_hash) {
            Ok(matched) => matched,
            Err(error) => {
                tracing::warn!(%error, "stored bcrypt hash is malformed");
                false
            },
        };
    }

    tracing::warn!("stored API key hash has an unsupported format");
    false
}
