//! Fuzz target for `Authorization` header parsing.
//!
//! Arbitrary header values must parse into a credential or fail with an
//! `AuthError`, never panic. Parsed Basic credentials must re-encode into a
//! header that parses back to the same pair.

#![no_main]

use gatekeeper_authn::credential::{BasicCredential, Credential};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(header) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(credential) = Credential::parse(header) else {
        return;
    };

    match credential {
        Credential::Basic(basic) => {
            let encoded = BasicCredential::encode(basic.username(), basic.api_key());
            let Ok(Credential::Basic(reparsed)) = Credential::parse(&encoded) else {
                panic!("re-encoded basic credential did not parse");
            };
            assert_eq!(reparsed.api_key(), basic.api_key());
        },
        Credential::ClientKey(key) => {
            assert!(!key.key().is_empty());
            let _ = key.key_hint();
        },
        Credential::Bearer(token) => {
            assert!(!token.as_str().is_empty());
        },
    }
});
