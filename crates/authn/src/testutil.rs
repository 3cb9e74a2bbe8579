//! Shared test utilities for token and webhook testing.
//!
//! This module provides a fully wired issuer/validator fixture over the
//! in-memory stores, helpers for crafting raw JWT strings (for attack
//! testing) and signing webhook deliveries, and the [`assert_auth_error!`]
//! macro. It is feature-gated behind `testutil` to prevent leaking into
//! production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! huddle-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use huddle_authn::testutil::{Fixture, craft_raw_jwt, sign_webhook};
//! ```

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use huddle_storage::{
    SubscriberId,
    auth::MemorySigningKeyStore,
    subscription::{MemorySubscriptionStore, SubscriptionStatus},
};
use sha2::Sha256;

use crate::{
    config::AuthConfig, issuer::TokenIssuer, rotation::KeyRotationManager,
    subscription::SubscriptionCache, validator::TokenValidator,
};

/// The default configuration.
#[must_use]
pub fn test_config() -> AuthConfig {
    AuthConfig::default()
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The result is `{header_b64}.{payload_b64}.{signature}` with `signature`
/// appended verbatim (pass `""` for an unsigned token). Useful for testing
/// rejection of malformed or attack tokens (`alg: "none"`, algorithm
/// confusion, forged `kid`).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(
    header_json: &serde_json::Value,
    payload_json: &serde_json::Value,
    signature: &str,
) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.{signature}")
}

/// Builds a `Stripe-Signature` header value for `body` signed at `timestamp`.
///
/// # Panics
///
/// Never in practice; HMAC accepts keys of any length.
#[must_use]
pub fn sign_webhook(secret: &[u8], body: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("hmac key");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// Issuer, validator and subscription cache wired over in-memory stores,
/// with one key rotated in at construction time.
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Backing key store.
    pub key_store: MemorySigningKeyStore,
    /// Backing subscription store.
    pub subscription_store: MemorySubscriptionStore,
    /// Rotation manager over `key_store`.
    pub manager: Arc<KeyRotationManager>,
    /// Cache over `subscription_store`.
    pub subscriptions: SubscriptionCache,
    /// Issuer sharing `manager`.
    pub issuer: TokenIssuer,
    /// Validator sharing `manager` and `subscriptions`.
    pub validator: TokenValidator,
}

impl Fixture {
    /// Default configuration, first key rotated in at `now`.
    ///
    /// # Panics
    ///
    /// Panics if the initial rotation fails.
    pub async fn new(now: DateTime<Utc>) -> Self {
        Self::with_config(test_config(), now).await
    }

    /// Custom configuration, first key rotated in at `now`.
    ///
    /// # Panics
    ///
    /// Panics if the initial rotation fails.
    pub async fn with_config(config: AuthConfig, now: DateTime<Utc>) -> Self {
        let key_store = MemorySigningKeyStore::with_history_limit(config.key_history_limit());
        let subscription_store = MemorySubscriptionStore::new();

        let manager = Arc::new(KeyRotationManager::new(Arc::new(key_store.clone()), config.clone()));
        manager.rotate(now).await.expect("initial rotation");

        let subscriptions =
            SubscriptionCache::from_config(Arc::new(subscription_store.clone()), &config);
        let issuer = TokenIssuer::new(Arc::clone(&manager));
        let validator = TokenValidator::new(Arc::clone(&manager), subscriptions.clone());

        Self { key_store, subscription_store, manager, subscriptions, issuer, validator }
    }

    /// Records `subscriber_id` with `status`, updated at `now`, period
    /// ending 30 days later.
    ///
    /// # Panics
    ///
    /// Panics if the upsert fails.
    pub async fn subscribe(&self, subscriber_id: &str, status: SubscriptionStatus, now: DateTime<Utc>) {
        self.subscriptions
            .upsert(&SubscriberId::from(subscriber_id), status, now + Duration::days(30), now)
            .await
            .expect("subscription upsert");
    }
}

/// Asserts that a [`Result<T, AuthError>`](crate::AuthError) is an `Err`
/// matching the given variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use huddle_authn::assert_auth_error;
/// use huddle_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::TokenExpired);
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {{
        let result = &$result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            result,
        );
    }};
    ($result:expr, $variant:ident, $msg:expr) => {{
        let result = &$result;
        assert!(
            matches!(result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            result,
        );
    }};
}
