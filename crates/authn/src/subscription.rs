//! Local mirror of subscriber billing status.
//!
//! The payment provider is the source of truth; webhook deliveries keep this
//! mirror current. A record that has not been refreshed within the TTL is
//! treated as absent, so a subscriber whose webhooks stop arriving loses
//! access rather than keeping it indefinitely.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use huddle_storage::{
    StorageError, StorageResult, SubscriberId,
    subscription::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore},
};

use crate::{
    config::{AuthConfig, to_chrono},
    error::Result,
};

/// Entitlement lookups and webhook-driven updates over a
/// [`SubscriptionStore`].
#[derive(Clone)]
pub struct SubscriptionCache {
    store: Arc<dyn SubscriptionStore>,
    ttl: Duration,
    store_timeout: Duration,
}

impl std::fmt::Debug for SubscriptionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionCache")
            .field("ttl", &self.ttl)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl SubscriptionCache {
    /// Creates a cache whose records expire `ttl` after their last update.
    pub fn new(store: Arc<dyn SubscriptionStore>, ttl: Duration, store_timeout: Duration) -> Self {
        Self { store, ttl, store_timeout }
    }

    /// Creates a cache using the TTL and store timeout from `config`.
    pub fn from_config(store: Arc<dyn SubscriptionStore>, config: &AuthConfig) -> Self {
        Self::new(store, config.subscription_ttl(), config.store_timeout())
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StorageResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.store_timeout, "Subscription store call timed out");
                Err(StorageError::timeout().into())
            },
        }
    }

    /// Overwrites the record for `subscriber_id` with `last_updated = now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`](crate::AuthError::UpstreamUnavailable)
    /// if the store fails.
    #[tracing::instrument(skip(self), fields(subscriber = %subscriber_id))]
    pub async fn upsert(
        &self,
        subscriber_id: &SubscriberId,
        status: SubscriptionStatus,
        current_period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let record = SubscriptionRecord::builder()
            .subscriber_id(subscriber_id.clone())
            .status(status)
            .current_period_end(current_period_end)
            .last_updated(now)
            .build();
        self.bounded("put", self.store.put(&record)).await?;

        tracing::info!(
            audit.action = "subscription.upsert",
            audit.resource = %subscriber_id,
            audit.result = "success",
            status = %status,
            "Subscription status recorded"
        );
        Ok(())
    }

    /// Sets the status of an existing record to `past_due`.
    ///
    /// Returns `false` (and changes nothing) if no record exists.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`](crate::AuthError::UpstreamUnavailable)
    /// if the store fails.
    pub async fn mark_past_due(&self, subscriber_id: &SubscriberId) -> Result<bool> {
        self.set_status(subscriber_id, SubscriptionStatus::PastDue).await
    }

    /// Sets the status of an existing record to `active`.
    ///
    /// Returns `false` (and changes nothing) if no record exists.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`](crate::AuthError::UpstreamUnavailable)
    /// if the store fails.
    pub async fn mark_active(&self, subscriber_id: &SubscriberId) -> Result<bool> {
        self.set_status(subscriber_id, SubscriptionStatus::Active).await
    }

    #[tracing::instrument(skip(self), fields(subscriber = %subscriber_id))]
    async fn set_status(
        &self,
        subscriber_id: &SubscriberId,
        status: SubscriptionStatus,
    ) -> Result<bool> {
        let updated =
            self.bounded("update_status", self.store.update_status(subscriber_id, status)).await?;
        match updated {
            Some(_) => {
                tracing::info!(
                    audit.action = "subscription.status",
                    audit.resource = %subscriber_id,
                    audit.result = "success",
                    status = %status,
                    "Subscription status updated"
                );
                Ok(true)
            },
            None => {
                tracing::debug!(status = %status, "No subscription record to update");
                Ok(false)
            },
        }
    }

    /// Returns `true` if a fresh record exists and grants access at `now`.
    ///
    /// Absent and stale records are not entitled.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`](crate::AuthError::UpstreamUnavailable)
    /// if the store fails. Callers must not treat this as "entitled".
    #[tracing::instrument(skip(self), fields(subscriber = %subscriber_id))]
    pub async fn has_entitlement(
        &self,
        subscriber_id: &SubscriberId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(record) = self.bounded("get", self.store.get(subscriber_id)).await? else {
            tracing::debug!("No subscription record");
            return Ok(false);
        };

        if !record.is_fresh(now, to_chrono(self.ttl)) {
            tracing::debug!(last_updated = %record.last_updated, "Subscription record is stale");
            return Ok(false);
        }
        Ok(record.is_entitled(now))
    }

    /// Removes records older than the TTL. Returns how many were removed.
    ///
    /// A TTL reaching back before the earliest representable time purges
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UpstreamUnavailable`](crate::AuthError::UpstreamUnavailable)
    /// if the store fails.
    pub async fn purge_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let Some(cutoff) = now.checked_sub_signed(to_chrono(self.ttl)) else {
            return Ok(0);
        };
        let removed = self.bounded("purge_stale", self.store.purge_stale(cutoff)).await?;
        if removed > 0 {
            tracing::info!(removed, "Purged stale subscription records");
        }
        Ok(removed)
    }
}
