//! Subscription record type.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SubscriberId;

/// Billing state of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and current.
    Active,
    /// In a free trial period; entitled like `Active`.
    Trialing,
    /// Latest invoice failed. Not entitled until payment succeeds.
    PastDue,
    /// Ended, either by the subscriber or by the provider.
    Canceled,
}

impl SubscriptionStatus {
    /// Returns `true` for statuses that grant access to paid features.
    #[must_use]
    pub fn grants_access(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Stable string form, matching the serialized value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string that does not map to any [`SubscriptionStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown subscription status: {0}")]
pub struct UnknownSubscriptionStatus(pub String);

/// Parses a payment provider status string.
///
/// Besides the four canonical values, provider-specific statuses are folded
/// onto the closest state: `unpaid` is treated as past due, and
/// `incomplete`, `incomplete_expired` and `paused` as canceled. Neither
/// grants access.
impl FromStr for SubscriptionStatus {
    type Err = UnknownSubscriptionStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" | "unpaid" => Ok(Self::PastDue),
            "canceled" | "incomplete" | "incomplete_expired" | "paused" => Ok(Self::Canceled),
            other => Err(UnknownSubscriptionStatus(other.to_owned())),
        }
    }
}

/// Local record of a subscriber's billing state.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use huddle_storage::subscription::{SubscriptionRecord, SubscriptionStatus};
///
/// let now = Utc::now();
/// let record = SubscriptionRecord::builder()
///     .subscriber_id("cus_123")
///     .status(SubscriptionStatus::Active)
///     .current_period_end(now + Duration::days(30))
///     .last_updated(now)
///     .build();
///
/// assert!(record.is_entitled(now));
/// assert!(record.is_fresh(now, Duration::hours(24)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionRecord {
    /// Payment provider customer id.
    #[builder(into)]
    pub subscriber_id: SubscriberId,

    /// Current billing state.
    pub status: SubscriptionStatus,

    /// End of the paid (or trial) period.
    pub current_period_end: DateTime<Utc>,

    /// When the record was last written by an upsert.
    #[builder(default = Utc::now())]
    pub last_updated: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Returns `true` if the status grants access and the period has not
    /// ended at `now`.
    #[must_use]
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        self.status.grants_access() && self.current_period_end > now
    }

    /// Returns `true` if the record was written less than `ttl` before `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_updated < ttl
    }
}
