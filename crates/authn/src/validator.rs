//! Session token validation.
//!
//! Two entry points: [`TokenValidator::verify_signature_and_claims`] for
//! services that only need an authentic, unexpired token, and
//! [`TokenValidator::verify_with_entitlement`] for anything that serves paid
//! content and must also see a live subscription.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::{HeaderMap, header};

use crate::{
    error::{AuthError, Result},
    jwt::{TokenClaims, verify_token},
    rotation::KeyRotationManager,
    subscription::SubscriptionCache,
};

/// Verifies session tokens against the current verification key set.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<KeyRotationManager>,
    subscriptions: SubscriptionCache,
}

impl TokenValidator {
    /// Creates a validator.
    pub fn new(keys: Arc<KeyRotationManager>, subscriptions: SubscriptionCache) -> Self {
        Self { keys, subscriptions }
    }

    /// Verifies the token's signature under an acceptable key, then its
    /// expiry, issue time, issuer and audience.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingToken`] for an empty token
    /// - [`AuthError::InvalidToken`] for malformed tokens, forbidden
    ///   algorithms, unknown or out-of-grace keys, and bad signatures
    /// - [`AuthError::TokenExpired`] past `exp` plus the clock tolerance
    /// - [`AuthError::ClaimMismatch`] for a foreign issuer or audience
    /// - [`AuthError::UpstreamUnavailable`] if the key store fails
    #[tracing::instrument(skip(self, token))]
    pub async fn verify_signature_and_claims(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let candidates = self.keys.get_verification_keys(now).await?;
        verify_token(token, &candidates, self.keys.config(), now).inspect_err(|err| {
            tracing::debug!(code = err.code(), error = %err, "Token rejected");
        })
    }

    /// [`verify_signature_and_claims`](Self::verify_signature_and_claims),
    /// then requires the subject to hold a live subscription.
    ///
    /// # Errors
    ///
    /// As above, plus [`AuthError::SubscriptionInactive`] when the subscriber
    /// is not entitled at `now`, and [`AuthError::UpstreamUnavailable`] when
    /// the subscription store fails.
    #[tracing::instrument(skip(self, token))]
    pub async fn verify_with_entitlement(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims> {
        let claims = self.verify_signature_and_claims(token, now).await?;
        if !self.subscriptions.has_entitlement(&claims.subscriber_id(), now).await? {
            tracing::debug!(subscriber = %claims.sub, "Token valid but subscription inactive");
            return Err(AuthError::SubscriptionInactive);
        }
        Ok(claims)
    }

    /// Finds the token in `headers` using the configured cookie name.
    ///
    /// See [`extract_token`].
    #[must_use]
    pub fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        extract_token(headers, self.keys.config().cookie_name())
    }
}

/// Finds the session token in request headers.
///
/// `Authorization: Bearer <token>` wins (the scheme is matched
/// case-insensitively); otherwise the cookie named `cookie_name` is used.
/// Empty values count as absent.
#[must_use]
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers, cookie_name))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}

fn cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}
