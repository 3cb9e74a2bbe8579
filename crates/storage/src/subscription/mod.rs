//! Subscription records and their storage.
//!
//! A [`SubscriptionRecord`] is the gateway's local view of a subscriber's
//! billing state, written from payment provider webhooks and read on every
//! entitlement check.

mod record;
mod store;

pub use record::{SubscriptionRecord, SubscriptionStatus, UnknownSubscriptionStatus};
pub use store::{MemorySubscriptionStore, SubscriptionStore};
