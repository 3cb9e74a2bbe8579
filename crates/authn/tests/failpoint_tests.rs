#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the authn crate.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p huddle-authn --features failpoints --test failpoint_tests
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use huddle_authn::{AuthConfig, AuthError, KeyRotationManager, jwt::Plan, testutil::Fixture};
use huddle_storage::auth::{MemorySigningKeyStore, SigningKeyStore};

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}

#[tokio::test]
async fn rotation_store_write_failpoint_keeps_previous_key() {
    let scenario = fail::FailScenario::setup();
    let fx = Fixture::new(t0()).await;
    let before = fx.key_store.get_active_key().await.expect("store").expect("key");
    let token = fx.issuer.mint(&"cus_1".into(), "a@b.c", Plan::Pro, t0()).await.expect("mint");

    // Enable fail point: the write never reaches the store
    fail::cfg("rotation-before-store-write", "return").expect("failed to configure fail point");

    let result = fx.manager.rotate(t0() + Duration::days(90)).await;
    assert!(matches!(result, Err(AuthError::UpstreamUnavailable(_))), "got: {result:?}");

    let after = fx.key_store.get_active_key().await.expect("store").expect("key");
    assert_eq!(before.id, after.id, "failed rotation must not change the active key");
    assert_eq!(fx.key_store.snapshot().len(), 1);
    assert!(fx.validator.verify_signature_and_claims(&token, t0()).await.is_ok());

    scenario.teardown();
}

#[tokio::test]
async fn rotation_without_failpoint_succeeds() {
    let scenario = fail::FailScenario::setup();
    let store = MemorySigningKeyStore::new();
    let manager = KeyRotationManager::new(Arc::new(store.clone()), AuthConfig::default());

    // No fail point configured: the rotation lands
    let key = manager.rotate(t0()).await.expect("rotation should succeed without fail point");
    assert_eq!(store.snapshot().active().map(|k| k.id.clone()), Some(key.id));

    scenario.teardown();
}
