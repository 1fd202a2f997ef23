//! Fuzz target for JWT header decoding and validation.
//!
//! Feeds arbitrary byte strings as JWT tokens to the header decoder and the
//! algorithm and `kid` checks that run before any key lookup. Every result
//! must be either `Ok(...)` or `Err(AuthError)`.

#![no_main]

use gatekeeper_authn::{
    jwt::{algorithm_name, decode_jwt_header},
    validation::{validate_algorithm, validate_kid},
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // JWT tokens are always UTF-8 strings
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(header) = decode_jwt_header(token) else {
        return;
    };

    let _ = validate_algorithm(&algorithm_name(header.alg));
    if let Some(ref kid) = header.kid {
        let _ = validate_kid(kid);
    }
});
