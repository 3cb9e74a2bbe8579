//! JWT header validation.
//!
//! Session tokens are signed with a shared HMAC secret, so exactly one
//! algorithm is acceptable. Everything else is refused before any key is
//! looked up: `none` would skip verification entirely, and an asymmetric
//! algorithm in the header is the classic algorithm-confusion attack.

use crate::error::AuthError;

/// Algorithms that are never accepted.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "None", "NONE"];

/// Accepted JWT algorithms.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["HS256"];

/// Maximum length of a `kid` header value.
pub const MAX_KID_LENGTH: usize = 128;

/// Validate a JWT `alg` header value.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the algorithm is `none` or is not
/// in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use huddle_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("HS256").is_ok());
/// assert!(validate_algorithm("none").is_err());
/// assert!(validate_algorithm("RS256").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::invalid_token(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::invalid_token(format!(
            "Algorithm '{alg}' is not in accepted list (only HS256 is supported)"
        )));
    }

    Ok(())
}

/// Validate a JWT `kid` header value.
///
/// Key ids are generated internally (`key-<uuid>` or `bootstrap`), so
/// anything outside `[A-Za-z0-9._-]{1,128}` is rejected before it reaches a
/// store lookup or a log line.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] for empty, oversized, or
/// non-conforming values.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::invalid_token("kid is empty"));
    }
    if kid.len() > MAX_KID_LENGTH {
        return Err(AuthError::invalid_token(format!(
            "kid exceeds {MAX_KID_LENGTH} characters"
        )));
    }
    if !kid.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')) {
        return Err(AuthError::invalid_token("kid contains invalid characters"));
    }
    Ok(())
}
