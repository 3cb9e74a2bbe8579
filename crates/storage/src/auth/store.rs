//! Storage trait for signing key rotation.
//!
//! This module provides the [`SigningKeyStore`] trait that abstracts
//! persistence of the [`KeyRing`]. Implementations can use different
//! backends (a durable key-value store in production, in-memory for tests)
//! as long as [`replace_active_key`](SigningKeyStore::replace_active_key) is
//! a single atomic write.
//!
//! # Usage
//!
//! ```no_run
//! // Demonstrates the trait interface; requires a concrete store implementation.
//! use chrono::Utc;
//! use huddle_storage::auth::{SigningKey, SigningKeyStore};
//! use huddle_storage::StorageError;
//!
//! async fn install<S: SigningKeyStore>(store: &S, key: &SigningKey) -> Result<(), StorageError> {
//!     let now = Utc::now();
//!     store.replace_active_key(key, now, now - chrono::Duration::hours(24)).await
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    auth::{DEFAULT_KEY_HISTORY_LIMIT, KeyRing, SigningKey},
    error::StorageResult,
};

/// Persistence layer for the signing key ring.
///
/// # Error Handling
///
/// Operations return [`StorageResult`]. An unreachable backend must surface
/// as [`StorageError::Connection`](crate::StorageError::Connection) or
/// [`StorageError::Timeout`](crate::StorageError::Timeout), never as an
/// empty result, so callers can fail closed.
#[async_trait]
pub trait SigningKeyStore: Send + Sync {
    /// Returns the key currently used for signing.
    ///
    /// `Ok(None)` means the store has never been bootstrapped.
    async fn get_active_key(&self) -> StorageResult<Option<SigningKey>>;

    /// Returns every retained key, most recent first.
    ///
    /// The active key, when present, is the first element.
    async fn get_key_history(&self) -> StorageResult<Vec<SigningKey>>;

    /// Atomically installs `new_key` as the active key.
    ///
    /// The previous active key is marked retired at
    /// `previous_key_retired_at`. History beyond the retention cap is
    /// dropped, except keys retired after `grace_cutoff`, which still verify
    /// tokens and are kept. A reader never observes a state with zero active
    /// keys once one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A key with the same id is already retained ([`StorageError::Conflict`](crate::StorageError::Conflict))
    /// - `new_key` is not active ([`StorageError::Internal`](crate::StorageError::Internal))
    /// - The storage backend is unavailable
    async fn replace_active_key(
        &self,
        new_key: &SigningKey,
        previous_key_retired_at: DateTime<Utc>,
        grace_cutoff: DateTime<Utc>,
    ) -> StorageResult<()>;
}

/// In-memory implementation of [`SigningKeyStore`].
///
/// Clones share the same ring, so a store handed to the rotation manager and
/// one kept by a test observe the same state.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use huddle_storage::auth::{MemorySigningKeyStore, SigningKey, SigningKeyStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySigningKeyStore::new();
///     assert!(store.get_active_key().await?.is_none());
///
///     let key = SigningKey::builder()
///         .id("key-1")
///         .secret("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8".to_owned())
///         .build();
///     let now = Utc::now();
///     store.replace_active_key(&key, now, now).await?;
///
///     assert_eq!(store.get_active_key().await?.map(|k| k.id), Some("key-1".to_owned()));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemorySigningKeyStore {
    ring: Arc<RwLock<KeyRing>>,
    history_limit: usize,
}

impl Default for MemorySigningKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySigningKeyStore {
    /// Creates an empty store retaining [`DEFAULT_KEY_HISTORY_LIMIT`] keys.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_KEY_HISTORY_LIMIT)
    }

    /// Creates an empty store retaining at most `history_limit` keys.
    ///
    /// A limit of zero is raised to one so the active key is always kept.
    #[must_use]
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self { ring: Arc::new(RwLock::new(KeyRing::new())), history_limit: history_limit.max(1) }
    }

    /// Returns a copy of the current ring.
    #[must_use]
    pub fn snapshot(&self) -> KeyRing {
        self.ring.read().clone()
    }
}

#[async_trait]
impl SigningKeyStore for MemorySigningKeyStore {
    #[tracing::instrument(skip(self))]
    async fn get_active_key(&self) -> StorageResult<Option<SigningKey>> {
        Ok(self.ring.read().active().cloned())
    }

    #[tracing::instrument(skip(self))]
    async fn get_key_history(&self) -> StorageResult<Vec<SigningKey>> {
        Ok(self.ring.read().history().to_vec())
    }

    /// Atomic replace: retire, install and trim happen under one write lock.
    #[tracing::instrument(skip(self, new_key), fields(kid = %new_key.id))]
    async fn replace_active_key(
        &self,
        new_key: &SigningKey,
        previous_key_retired_at: DateTime<Utc>,
        grace_cutoff: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut ring = self.ring.write();
        ring.install(new_key.clone(), previous_key_retired_at, grace_cutoff, self.history_limit)
    }
}
