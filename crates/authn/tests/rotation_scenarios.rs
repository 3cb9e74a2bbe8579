//! End-to-end key rotation scenarios.
//!
//! Tokens are minted and verified through the public issuer and validator
//! while keys rotate underneath them.
#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use huddle_authn::{
    AuthConfig, BootstrapKeyProvider, KeyRotationManager, SubscriptionCache, TokenIssuer,
    TokenValidator, assert_auth_error, jwt::Plan, testutil::Fixture,
};
use huddle_storage::{
    Zeroizing,
    auth::{KeyStatus, MemorySigningKeyStore, SigningKeyStore},
    subscription::MemorySubscriptionStore,
    testutil::TEST_SECRET,
};

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}

/// Tokens that outlive a rotation, so key acceptance is what gets tested.
fn long_lived_config() -> AuthConfig {
    AuthConfig::builder()
        .token_lifetime(StdDuration::from_secs(7 * 86_400))
        .build()
        .expect("valid config")
}

#[tokio::test]
async fn test_quarterly_rotation_grace_window() {
    // Key A active from t0; at t0+90d key B replaces it. A token signed with
    // A at t0+89d verifies at t0+90d+23h and fails at t0+90d+25h.
    let fx = Fixture::with_config(long_lived_config(), t0()).await;
    let key_a = fx.key_store.get_active_key().await.expect("store").expect("key A");

    let minted_at = t0() + Duration::days(89);
    let token = fx.issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, minted_at).await.expect("mint");

    let rotated_at = t0() + Duration::days(90);
    let key_b = fx.manager.rotate_if_due(rotated_at).await.expect("rotate").expect("due");
    assert_ne!(key_a.id, key_b.id);

    let inside = rotated_at + Duration::hours(23);
    let claims = fx.validator.verify_signature_and_claims(&token, inside).await.expect("in grace");
    assert_eq!(claims.sub, "cus_1");

    let outside = rotated_at + Duration::hours(25);
    let result = fx.validator.verify_signature_and_claims(&token, outside).await;
    assert_auth_error!(result, InvalidToken);

    let fresh = fx.issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, outside).await.expect("mint");
    assert!(fx.validator.verify_signature_and_claims(&fresh, outside).await.is_ok());
}

#[tokio::test]
async fn test_in_flight_token_survives_rotation() {
    let fx = Fixture::new(t0()).await;
    let token = fx.issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.expect("mint");

    let now = t0() + Duration::minutes(5);
    fx.manager.rotate(now).await.expect("rotate");

    assert!(fx.validator.verify_signature_and_claims(&token, now).await.is_ok());
}

#[tokio::test]
async fn test_not_due_does_not_rotate() {
    let fx = Fixture::new(t0()).await;
    let before = fx.key_store.get_active_key().await.expect("store").expect("key");

    let result = fx.manager.rotate_if_due(t0() + Duration::days(89)).await.expect("check");
    assert!(result.is_none());
    let after = fx.key_store.get_active_key().await.expect("store").expect("key");
    assert_eq!(before.id, after.id);
}

#[tokio::test]
async fn test_history_trimmed_to_retention_cap() {
    let fx = Fixture::new(t0()).await;
    for quarter in 1..=5 {
        fx.manager.rotate(t0() + Duration::days(90 * quarter)).await.expect("rotate");
    }

    let history = fx.key_store.get_key_history().await.expect("history");
    assert_eq!(history.len(), fx.manager.config().key_history_limit());
    assert_eq!(history.iter().filter(|k| k.status == KeyStatus::Active).count(), 1);
    assert!(history[0].is_active());
    assert!(history.windows(2).all(|pair| pair[0].created_at > pair[1].created_at));
}

#[tokio::test]
async fn test_back_to_back_rotations_keep_every_in_grace_key_verifying() {
    let fx = Fixture::new(t0()).await;
    let token = fx.issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.expect("mint");

    let now = t0() + Duration::minutes(1);
    fx.manager.rotate(now).await.expect("rotate");
    fx.manager.rotate(now).await.expect("rotate");

    // The first key was retired at `now` too, so it is still in grace.
    let keys = fx.manager.get_verification_keys(now).await.expect("keys");
    assert_eq!(keys.len(), 3);
    assert!(fx.validator.verify_signature_and_claims(&token, now).await.is_ok());
}

#[tokio::test]
async fn test_rotation_burst_past_history_limit_keeps_old_tokens_verifying() {
    // Four rotations within seconds push the first key past the retention
    // cap while it is still in grace.
    let fx = Fixture::new(t0()).await;
    let token = fx.issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.expect("mint");

    for second in 1..=4 {
        fx.manager.rotate(t0() + Duration::seconds(second)).await.expect("rotate");
    }

    let now = t0() + Duration::seconds(10);
    let claims = fx.validator.verify_signature_and_claims(&token, now).await.expect("in grace");
    assert_eq!(claims.sub, "cus_1");
    let history = fx.key_store.get_key_history().await.expect("history");
    assert!(history.len() > fx.manager.config().key_history_limit());
    assert_eq!(fx.manager.get_verification_keys(now).await.expect("keys").len(), history.len());

    // The next rotation after grace drops everything beyond the cap.
    fx.manager.rotate(t0() + Duration::days(2)).await.expect("rotate");
    let history = fx.key_store.get_key_history().await.expect("history");
    assert_eq!(history.len(), fx.manager.config().key_history_limit());
}

#[tokio::test]
async fn test_bootstrap_then_first_rotation() {
    let config = long_lived_config();
    let store = MemorySigningKeyStore::new();
    let bootstrap =
        BootstrapKeyProvider::new(Zeroizing::new(TEST_SECRET.to_owned()), t0()).expect("bootstrap");
    let manager = Arc::new(
        KeyRotationManager::new(Arc::new(store.clone()), config.clone()).with_bootstrap(bootstrap),
    );
    let subscriptions =
        SubscriptionCache::from_config(Arc::new(MemorySubscriptionStore::new()), &config);
    let issuer = TokenIssuer::new(Arc::clone(&manager));
    let validator = TokenValidator::new(Arc::clone(&manager), subscriptions);

    let bootstrap_token =
        issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.expect("mint");
    assert!(validator.verify_signature_and_claims(&bootstrap_token, t0()).await.is_ok());

    let rotated_at = t0() + Duration::hours(1);
    manager.rotate(rotated_at).await.expect("first rotation");
    assert_eq!(store.snapshot().len(), 1);

    let inside = rotated_at + Duration::hours(23);
    let claims =
        validator.verify_signature_and_claims(&bootstrap_token, inside).await.expect("in grace");
    assert_eq!(claims.sub, "cus_1");

    let outside = rotated_at + Duration::hours(24);
    let result = validator.verify_signature_and_claims(&bootstrap_token, outside).await;
    assert_auth_error!(result, InvalidToken);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_validation_during_rotation() {
    // Readers racing a rotation never see a verification failure.
    let fx = Fixture::new(t0()).await;
    let token = fx.issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.expect("mint");
    let now = t0() + Duration::minutes(1);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let validator = fx.validator.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                validator.verify_signature_and_claims(&token, now).await.expect("verify");
                tokio::task::yield_now().await;
            }
        }));
    }
    let manager = Arc::clone(&fx.manager);
    let rotator = tokio::spawn(async move {
        for _ in 0..3 {
            manager.rotate(now).await.expect("rotate");
            tokio::task::yield_now().await;
        }
    });

    rotator.await.expect("rotator");
    for handle in handles {
        handle.await.expect("reader");
    }

    let history = fx.key_store.get_key_history().await.expect("history");
    assert_eq!(history.iter().filter(|k| k.is_active()).count(), 1);
}
