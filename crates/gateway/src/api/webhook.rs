//! Payment provider webhook receiver.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use huddle_authn::webhook::{SIGNATURE_HEADER, apply_event, parse_event, verify_signature};
use serde::{Deserialize, Serialize};

use crate::{api::error::ApiError, app::AppState};

/// Acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    /// Always `true`.
    pub received: bool,
}

/// `POST /webhooks/stripe`
///
/// The signature is checked over the raw body before anything is parsed.
/// A 500 tells the provider to redeliver.
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let now = Utc::now();
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    verify_signature(
        state.config.webhook_secret.as_bytes(),
        signature,
        &body,
        now,
        state.config.webhook_tolerance,
    )?;

    let event = parse_event(&body)?;
    tracing::info!(event = event.kind(), "Webhook received");
    apply_event(&state.subscriptions, &event, now).await?;

    Ok(Json(WebhookAck { received: true }))
}
