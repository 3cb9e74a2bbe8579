//! Session token claims, signing and verification.
//!
//! Tokens are compact JWS strings signed with HS256 under one of the keys
//! managed by [`KeyRotationManager`](crate::rotation::KeyRotationManager).
//! The header carries the signing key id as `kid`.
//!
//! ```json
//! {
//!   "iss": "huddle-auth",
//!   "aud": "huddle-mcp",
//!   "sub": "cus_123",
//!   "email": "fan@example.com",
//!   "plan": "pro",
//!   "iat": 1700000000,
//!   "exp": 1700000900
//! }
//! ```
//!
//! Expiry, issuer and audience are checked here against an explicit `now`
//! rather than by `jsonwebtoken`, so the rotation and expiry boundaries are
//! deterministic under test.

use std::{fmt, str::FromStr};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use huddle_storage::{SubscriberId, auth::SigningKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AuthConfig, to_chrono},
    error::AuthError,
    validation::{validate_algorithm, validate_kid},
};

/// Paid subscription tier carried in the `plan` claim.
///
/// Only paid tiers exist: a token can never be minted for a free user, and a
/// token carrying any other value fails to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Standard paid tier.
    Pro,
    /// Top paid tier.
    Premium,
}

impl Plan {
    /// Claim value for this plan.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pro" => Ok(Self::Pro),
            "premium" => Ok(Self::Premium),
            other => Err(AuthError::invalid_token(format!("'{other}' is not a paid plan"))),
        }
    }
}

/// Session token claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Subject: the payment provider customer id.
    pub sub: String,
    /// Subscriber email.
    pub email: String,
    /// Paid tier at mint time.
    pub plan: Plan,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
}

impl TokenClaims {
    /// The subscriber this token was minted for.
    #[must_use]
    pub fn subscriber_id(&self) -> SubscriberId {
        SubscriberId::from(self.sub.as_str())
    }

    /// `exp` as a timestamp, if representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// The subset of the JOSE header this crate inspects.
///
/// Decoded by hand rather than through [`jsonwebtoken::decode_header`] so
/// that `alg` values the library cannot represent (such as `none`) still
/// produce a precise rejection.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm.
    pub alg: String,
    /// Signing key id, if present.
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type, if present.
    #[serde(default)]
    pub typ: Option<String>,
}

/// Decode a JWT header without verification.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the token does not have three
/// segments or the header is not base64url-encoded JSON with an `alg`.
pub fn decode_jwt_header(token: &str) -> Result<TokenHeader, AuthError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::invalid_token("JWT must have 3 parts separated by dots"));
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| AuthError::invalid_token(format!("Failed to decode JWT header: {e}")))?;

    serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::invalid_token(format!("Failed to parse JWT header: {e}")))
}

/// Sign `claims` with `key`, setting the header `kid` to the key id.
///
/// # Errors
///
/// Returns [`AuthError::UpstreamUnavailable`] if the stored key material is
/// corrupt, or [`AuthError::InvalidToken`] if encoding fails.
pub fn sign_token(claims: &TokenClaims, key: &SigningKey) -> Result<String, AuthError> {
    let secret = key.secret_bytes()?;
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(key.id.clone());

    Ok(encode(&header, claims, &EncodingKey::from_secret(&secret))?)
}

fn hs256_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Time and audience checks run in `validate_claims` against an explicit clock.
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

/// Check the signature of `token` against a single key.
///
/// Returns `Ok(None)` when the signature does not match this key, so callers
/// can try the next candidate.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] for malformed tokens and claims that
/// fail to decode (including unknown plans), and
/// [`AuthError::UpstreamUnavailable`] for corrupt key material.
pub fn verify_signature(token: &str, key: &SigningKey) -> Result<Option<TokenClaims>, AuthError> {
    let secret = key.secret_bytes()?;
    match decode::<TokenClaims>(token, &DecodingKey::from_secret(&secret), &hs256_validation()) {
        Ok(data) => Ok(Some(data.claims)),
        Err(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::InvalidSignature) => {
            Ok(None)
        },
        Err(e) => Err(e.into()),
    }
}

/// Validate verified claims against the configuration at `now`.
///
/// Checks, in order: `exp > now - clock_tolerance`, `iat <= now +
/// clock_tolerance`, then issuer and audience equality.
///
/// # Errors
///
/// - [`AuthError::TokenExpired`] if the token has expired
/// - [`AuthError::InvalidToken`] if `iat` is in the future or after `exp`
/// - [`AuthError::ClaimMismatch`] if issuer or audience differ
pub fn validate_claims(
    claims: &TokenClaims,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let tolerance = to_chrono(config.clock_tolerance()).num_seconds();
    let now = now.timestamp();

    if claims.exp <= now.saturating_sub(tolerance) {
        return Err(AuthError::TokenExpired);
    }

    if claims.iat > now.saturating_add(tolerance) {
        return Err(AuthError::invalid_token("iat claim is in the future"));
    }
    if claims.iat >= claims.exp {
        return Err(AuthError::invalid_token("iat claim is not before exp"));
    }

    if claims.iss != config.issuer() {
        return Err(AuthError::claim_mismatch(format!(
            "expected issuer '{}', got '{}'",
            config.issuer(),
            claims.iss
        )));
    }
    if claims.aud != config.audience() {
        return Err(AuthError::claim_mismatch(format!(
            "expected audience '{}', got '{}'",
            config.audience(),
            claims.aud
        )));
    }

    Ok(())
}

/// Verify `token` against a set of candidate keys, then validate its claims.
///
/// `candidates` must be ordered newest first and contain only keys that are
/// acceptable for verification at `now`. When the header names a `kid`,
/// only that key is tried; a `kid` that is not among the candidates (unknown,
/// or retired beyond the grace period) is rejected. Without a `kid`, each
/// candidate is tried in order and the first signature match wins.
///
/// # Errors
///
/// Any of the errors from [`decode_jwt_header`], [`verify_signature`] and
/// [`validate_claims`], plus [`AuthError::InvalidToken`] when no candidate
/// key matches.
pub fn verify_token(
    token: &str,
    candidates: &[SigningKey],
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<TokenClaims, AuthError> {
    let header = decode_jwt_header(token)?;
    validate_algorithm(&header.alg)?;

    let claims = match header.kid.as_deref() {
        Some(kid) => {
            validate_kid(kid)?;
            let key = candidates.iter().find(|key| key.id == kid).ok_or_else(|| {
                tracing::debug!(kid = %kid, "Token signed by unknown or retired key");
                AuthError::invalid_token("unknown or expired signing key")
            })?;
            verify_signature(token, key)?
        },
        None => {
            let mut matched = None;
            for key in candidates {
                if let Some(claims) = verify_signature(token, key)? {
                    matched = Some(claims);
                    break;
                }
            }
            matched
        },
    }
    .ok_or_else(|| AuthError::invalid_token("Invalid signature"))?;

    validate_claims(&claims, config, now)?;
    Ok(claims)
}
