//! Payment provider webhook verification and event handling.
//!
//! The provider signs each delivery with HMAC-SHA256 over
//! `"{timestamp}.{raw_body}"` and sends the result in a header of the form:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! Several `v1` entries may appear while the endpoint secret is being rolled;
//! the delivery is authentic if any of them matches. Deliveries older than
//! the tolerance are rejected to bound replay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use huddle_storage::{SubscriberId, subscription::SubscriptionStatus};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::{
    config::to_chrono,
    error::Result,
    subscription::SubscriptionCache,
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default maximum age of a delivery.
pub const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Reasons a webhook delivery is refused.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum WebhookError {
    /// The signature header is absent.
    #[error("Missing signature header")]
    MissingSignature,

    /// The signature header has no timestamp or no `v1` entry.
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    /// The signed timestamp is older than the tolerance.
    #[error("Timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// No `v1` entry matches the expected signature.
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// The body is not a well-formed event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Verifies a delivery's signature header against the endpoint secret.
///
/// # Errors
///
/// Returns the [`WebhookError`] describing the first check that failed.
pub fn verify_signature(
    secret: &[u8],
    header: Option<&str>,
    raw_body: &[u8],
    now: DateTime<Utc>,
    tolerance: Duration,
) -> std::result::Result<(), WebhookError> {
    let header = header.ok_or(WebhookError::MissingSignature)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {},
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| WebhookError::MalformedHeader("no timestamp".to_owned()))?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::MalformedHeader("timestamp is not an integer".to_owned()))?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader("no v1 signature".to_owned()));
    }

    if now.timestamp().saturating_sub(signed_at) > to_chrono(tolerance).num_seconds() {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();

    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|candidate| bool::from(expected.as_slice().ct_eq(&candidate)));

    if matched { Ok(()) } else { Err(WebhookError::SignatureMismatch) }
}

/// The part of a subscription object the gateway mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    /// Provider customer id.
    pub customer: SubscriberId,
    /// Normalized billing status.
    pub status: SubscriptionStatus,
    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,
}

/// A parsed webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// `customer.subscription.created`
    SubscriptionCreated(SubscriptionChange),
    /// `customer.subscription.updated`
    SubscriptionUpdated(SubscriptionChange),
    /// `customer.subscription.deleted`
    SubscriptionDeleted(SubscriptionChange),
    /// `invoice.payment_succeeded`
    InvoicePaymentSucceeded {
        /// Provider customer id.
        customer: SubscriberId,
    },
    /// `invoice.payment_failed`
    InvoicePaymentFailed {
        /// Provider customer id.
        customer: SubscriberId,
    },
    /// Any other event type. Acknowledged and dropped.
    Ignored {
        /// The provider's event type string.
        event_type: String,
    },
}

impl WebhookEvent {
    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::SubscriptionCreated(_) => "customer.subscription.created",
            Self::SubscriptionUpdated(_) => "customer.subscription.updated",
            Self::SubscriptionDeleted(_) => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded { .. } => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed { .. } => "invoice.payment_failed",
            Self::Ignored { event_type } => event_type.as_str(),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct SubscriptionObject {
    customer: String,
    status: String,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<ItemList>,
}

#[derive(Deserialize)]
struct ItemList {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Deserialize)]
struct SubscriptionItem {
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[derive(Deserialize)]
struct InvoiceObject {
    customer: String,
}

fn malformed(detail: impl std::fmt::Display) -> WebhookError {
    WebhookError::MalformedPayload(detail.to_string())
}

fn parse_customer(customer: String) -> std::result::Result<SubscriberId, WebhookError> {
    if customer.is_empty() {
        return Err(malformed("empty customer id"));
    }
    Ok(SubscriberId::from(customer))
}

fn parse_subscription(
    object: serde_json::Value,
) -> std::result::Result<SubscriptionChange, WebhookError> {
    let object: SubscriptionObject = serde_json::from_value(object).map_err(malformed)?;

    let status = object.status.parse::<SubscriptionStatus>().map_err(malformed)?;
    let period_end = object
        .current_period_end
        .or_else(|| {
            object.items.as_ref().and_then(|items| items.data.first()?.current_period_end)
        })
        .ok_or_else(|| malformed("subscription has no current_period_end"))?;
    let current_period_end = DateTime::from_timestamp(period_end, 0)
        .ok_or_else(|| malformed("current_period_end out of range"))?;

    Ok(SubscriptionChange { customer: parse_customer(object.customer)?, status, current_period_end })
}

fn parse_invoice(object: serde_json::Value) -> std::result::Result<SubscriberId, WebhookError> {
    let object: InvoiceObject = serde_json::from_value(object).map_err(malformed)?;
    parse_customer(object.customer)
}

/// Parses a verified delivery body.
///
/// The envelope is validated first; the object is only decoded for event
/// types the gateway acts on, so unknown event shapes never fail.
///
/// # Errors
///
/// Returns [`WebhookError::MalformedPayload`] if the envelope or a handled
/// object is missing required fields or carries an unknown status.
pub fn parse_event(raw_body: &[u8]) -> std::result::Result<WebhookEvent, WebhookError> {
    let envelope: Envelope = serde_json::from_slice(raw_body).map_err(malformed)?;
    let object = envelope.data.object;

    Ok(match envelope.event_type.as_str() {
        "customer.subscription.created" => {
            WebhookEvent::SubscriptionCreated(parse_subscription(object)?)
        },
        "customer.subscription.updated" => {
            WebhookEvent::SubscriptionUpdated(parse_subscription(object)?)
        },
        "customer.subscription.deleted" => {
            WebhookEvent::SubscriptionDeleted(parse_subscription(object)?)
        },
        "invoice.payment_succeeded" => {
            WebhookEvent::InvoicePaymentSucceeded { customer: parse_invoice(object)? }
        },
        "invoice.payment_failed" => {
            WebhookEvent::InvoicePaymentFailed { customer: parse_invoice(object)? }
        },
        _ => WebhookEvent::Ignored { event_type: envelope.event_type },
    })
}

/// Applies an event to the subscription mirror.
///
/// A deleted subscription is recorded as `canceled` rather than removed, so
/// a late `updated` delivery cannot resurrect access by default.
///
/// # Errors
///
/// Returns [`AuthError::UpstreamUnavailable`](crate::AuthError::UpstreamUnavailable)
/// if the store fails; the provider should then redeliver.
#[tracing::instrument(skip(cache, event), fields(event = event.kind()))]
pub async fn apply_event(
    cache: &SubscriptionCache,
    event: &WebhookEvent,
    now: DateTime<Utc>,
) -> Result<()> {
    match event {
        WebhookEvent::SubscriptionCreated(change) | WebhookEvent::SubscriptionUpdated(change) => {
            cache.upsert(&change.customer, change.status, change.current_period_end, now).await
        },
        WebhookEvent::SubscriptionDeleted(change) => {
            cache
                .upsert(&change.customer, SubscriptionStatus::Canceled, change.current_period_end, now)
                .await
        },
        WebhookEvent::InvoicePaymentSucceeded { customer } => {
            cache.mark_active(customer).await.map(|_| ())
        },
        WebhookEvent::InvoicePaymentFailed { customer } => {
            cache.mark_past_due(customer).await.map(|_| ())
        },
        WebhookEvent::Ignored { event_type } => {
            tracing::debug!(event_type = %event_type, "Ignoring webhook event");
            Ok(())
        },
    }
}
