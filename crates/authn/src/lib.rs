//! # Huddle Authentication
//!
//! Subscription-gated session tokens for Huddle services.
//!
//! This crate provides:
//! - **Key rotation**: [`KeyRotationManager`] and [`RotationScheduler`] rotate the HMAC signing key
//!   on a fixed cadence and keep retired keys verifiable through a grace period
//! - **Token issuance**: [`TokenIssuer`] mints short-lived HS256 tokens for paying subscribers
//! - **Token validation**: [`TokenValidator`] verifies signature, expiry, issuer and audience, and
//!   optionally cross-checks live subscription status
//! - **Subscription mirror**: [`SubscriptionCache`] holds each subscriber's billing status, kept
//!   current by [`webhook`] deliveries
//!
//! ## Security
//!
//! - Only `HS256` is accepted; `none` and asymmetric algorithms are rejected before any key lookup
//! - Every store failure surfaces as [`AuthError::UpstreamUnavailable`]; nothing fails open
//! - Webhook signatures are compared in constant time
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use huddle_authn::{
//!     AuthConfig, KeyRotationManager, SubscriptionCache, TokenIssuer, TokenValidator, jwt::Plan,
//! };
//! use huddle_storage::{auth::MemorySigningKeyStore, subscription::MemorySubscriptionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::default();
//! let keys = Arc::new(KeyRotationManager::new(
//!     Arc::new(MemorySigningKeyStore::new()),
//!     config.clone(),
//! ));
//! keys.rotate_if_due(Utc::now()).await?;
//!
//! let subscriptions =
//!     SubscriptionCache::from_config(Arc::new(MemorySubscriptionStore::new()), &config);
//! let issuer = TokenIssuer::new(Arc::clone(&keys));
//! let validator = TokenValidator::new(keys, subscriptions);
//!
//! let token = issuer.mint(&"cus_123".into(), "fan@example.com", Plan::Pro, Utc::now()).await?;
//! let claims = validator.verify_signature_and_claims(&token, Utc::now()).await?;
//! assert_eq!(claims.sub, "cus_123");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Token and rotation configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// Token minting.
pub mod issuer;
/// Token claims, signing and verification.
pub mod jwt;
/// Signing key rotation.
pub mod rotation;
/// Subscription status mirror.
pub mod subscription;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Algorithm and key id validation.
pub mod validation;
/// Token validation.
pub mod validator;
/// Payment provider webhooks.
pub mod webhook;

// Re-export key types for convenience
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use issuer::TokenIssuer;
pub use jwt::{Plan, TokenClaims};
pub use rotation::{BootstrapKeyProvider, KeyRotationManager, RotationScheduler};
pub use subscription::SubscriptionCache;
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
pub use validator::{TokenValidator, extract_token};
pub use webhook::{WebhookError, WebhookEvent};
