//! Fuzz target for JWT parsing and verification.
//!
//! Feeds arbitrary byte strings as session tokens through header decoding
//! and the full verification pipeline. Every result must be either `Ok` or
//! `Err(AuthError)`; nothing may panic.

#![no_main]

use chrono::DateTime;
use huddle_authn::{
    AuthConfig,
    jwt::{decode_jwt_header, verify_token},
    validation::{validate_algorithm, validate_kid},
};
use huddle_storage::auth::SigningKey;
use libfuzzer_sys::fuzz_target;

const SECRET: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

fuzz_target!(|data: &[u8]| {
    // Tokens are always UTF-8 strings
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(header) = decode_jwt_header(token) {
        let _ = validate_algorithm(&header.alg);
        if let Some(ref kid) = header.kid {
            let _ = validate_kid(kid);
        }
    }

    let Some(now) = DateTime::from_timestamp(1_700_000_000, 0) else {
        return;
    };
    let key = SigningKey::builder().id("key-fuzz").secret(SECRET.to_owned()).created_at(now).build();
    let _ = verify_token(token, std::slice::from_ref(&key), &AuthConfig::default(), now);
});
