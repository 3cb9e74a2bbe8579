//! Storage trait for subscription records.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    error::StorageResult,
    subscription::{SubscriptionRecord, SubscriptionStatus},
    types::SubscriberId,
};

/// Persistence layer for [`SubscriptionRecord`]s, keyed by subscriber id.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Returns the record for `subscriber_id`, if any.
    async fn get(&self, subscriber_id: &SubscriberId) -> StorageResult<Option<SubscriptionRecord>>;

    /// Inserts or overwrites the record for `record.subscriber_id`.
    async fn put(&self, record: &SubscriptionRecord) -> StorageResult<()>;

    /// Atomically replaces only the status of an existing record.
    ///
    /// Every other field, `last_updated` included, is preserved. Returns the
    /// updated record, or `None` if no record exists (nothing is created).
    async fn update_status(
        &self,
        subscriber_id: &SubscriberId,
        status: SubscriptionStatus,
    ) -> StorageResult<Option<SubscriptionRecord>>;

    /// Removes records last written before `cutoff`. Returns how many were
    /// removed.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> StorageResult<usize>;
}

/// In-memory implementation of [`SubscriptionStore`].
///
/// # Thread Safety
///
/// Uses [`parking_lot::RwLock`]; each operation holds the lock for its whole
/// read-modify-write, so concurrent webhook deliveries for the same
/// subscriber never interleave.
#[derive(Debug, Default, Clone)]
pub struct MemorySubscriptionStore {
    records: Arc<RwLock<HashMap<SubscriberId, SubscriptionRecord>>>,
}

impl MemorySubscriptionStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    #[tracing::instrument(skip(self), fields(subscriber = %subscriber_id))]
    async fn get(&self, subscriber_id: &SubscriberId) -> StorageResult<Option<SubscriptionRecord>> {
        Ok(self.records.read().get(subscriber_id).cloned())
    }

    #[tracing::instrument(skip(self, record), fields(subscriber = %record.subscriber_id))]
    async fn put(&self, record: &SubscriptionRecord) -> StorageResult<()> {
        self.records.write().insert(record.subscriber_id.clone(), record.clone());
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(subscriber = %subscriber_id))]
    async fn update_status(
        &self,
        subscriber_id: &SubscriberId,
        status: SubscriptionStatus,
    ) -> StorageResult<Option<SubscriptionRecord>> {
        let mut records = self.records.write();
        Ok(records.get_mut(subscriber_id).map(|record| {
            record.status = status;
            record.clone()
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| record.last_updated >= cutoff);
        Ok(before - records.len())
    }
}
