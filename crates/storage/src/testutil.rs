//! Shared test utilities for store testing.
//!
//! This module provides record factories, a fault-injecting store wrapper,
//! and assertion macros for [`StorageResult`] values. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! huddle-storage = { path = "../storage", features = ["testutil"] }
//! ```

use std::{sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::{
    auth::{SigningKey, SigningKeyStore},
    error::{StorageError, StorageResult},
    subscription::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore},
    types::SubscriberId,
};

/// A fixed 32-byte secret (`0x00..=0x1f`) encoded as base64url.
pub const TEST_SECRET: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

/// Create an active signing key with a fixed secret.
#[must_use]
pub fn make_signing_key(id: &str, created_at: DateTime<Utc>) -> SigningKey {
    SigningKey::builder().id(id).secret(TEST_SECRET.to_owned()).created_at(created_at).build()
}

/// Create a subscription record whose period ends 30 days after `updated`.
#[must_use]
pub fn make_subscription(
    subscriber_id: &str,
    status: SubscriptionStatus,
    updated: DateTime<Utc>,
) -> SubscriptionRecord {
    SubscriptionRecord::builder()
        .subscriber_id(subscriber_id)
        .status(status)
        .current_period_end(updated + Duration::days(30))
        .last_updated(updated)
        .build()
}

/// Behaviour of a [`FaultInjectingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Pass every call through to the inner store.
    Healthy,
    /// Fail every call with [`StorageError::Connection`].
    Unavailable,
    /// Sleep for the given duration, then pass the call through.
    Slow(StdDuration),
}

/// Wraps a store and injects failures on demand.
///
/// The mode can be switched while the store is shared, so a test can let a
/// few calls through and then cut the backend off.
#[derive(Debug, Clone)]
pub struct FaultInjectingStore<S> {
    inner: S,
    mode: Arc<RwLock<FaultMode>>,
}

impl<S> FaultInjectingStore<S> {
    /// Wraps `inner` in [`FaultMode::Healthy`].
    pub fn new(inner: S) -> Self {
        Self { inner, mode: Arc::new(RwLock::new(FaultMode::Healthy)) }
    }

    /// Switches the failure mode.
    pub fn set_mode(&self, mode: FaultMode) {
        *self.mode.write() = mode;
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn check(&self) -> StorageResult<()> {
        let mode = *self.mode.read();
        match mode {
            FaultMode::Healthy => Ok(()),
            FaultMode::Unavailable => Err(StorageError::connection_with_source(
                "injected outage",
                std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            )),
            FaultMode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            },
        }
    }
}

#[async_trait]
impl<S: SigningKeyStore> SigningKeyStore for FaultInjectingStore<S> {
    async fn get_active_key(&self) -> StorageResult<Option<SigningKey>> {
        self.check().await?;
        self.inner.get_active_key().await
    }

    async fn get_key_history(&self) -> StorageResult<Vec<SigningKey>> {
        self.check().await?;
        self.inner.get_key_history().await
    }

    async fn replace_active_key(
        &self,
        new_key: &SigningKey,
        previous_key_retired_at: DateTime<Utc>,
        grace_cutoff: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.check().await?;
        self.inner.replace_active_key(new_key, previous_key_retired_at, grace_cutoff).await
    }
}

#[async_trait]
impl<S: SubscriptionStore> SubscriptionStore for FaultInjectingStore<S> {
    async fn get(&self, subscriber_id: &SubscriberId) -> StorageResult<Option<SubscriptionRecord>> {
        self.check().await?;
        self.inner.get(subscriber_id).await
    }

    async fn put(&self, record: &SubscriptionRecord) -> StorageResult<()> {
        self.check().await?;
        self.inner.put(record).await
    }

    async fn update_status(
        &self,
        subscriber_id: &SubscriberId,
        status: SubscriptionStatus,
    ) -> StorageResult<Option<SubscriptionRecord>> {
        self.check().await?;
        self.inner.update_status(subscriber_id, status).await
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        self.check().await?;
        self.inner.purge_stale(cutoff).await
    }
}

/// Assert that a [`StorageResult`] is an error of the given
/// [`StorageError`] variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use huddle_storage::assert_storage_error;
/// use huddle_storage::error::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::conflict("key-1"));
/// assert_storage_error!(result, Conflict);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {{
        let result = &$result;
        assert!(
            matches!(result, Err($crate::error::StorageError::$variant { .. })),
            "expected StorageError::{}, got: {:?}",
            stringify!($variant),
            result,
        );
    }};
    ($result:expr, $variant:ident, $msg:expr) => {{
        let result = &$result;
        assert!(
            matches!(result, Err($crate::error::StorageError::$variant { .. })),
            "{}: expected StorageError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            result,
        );
    }};
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}
