//! Central token validation for downstream services.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use chrono::Utc;
use huddle_authn::{Plan, TokenClaims};
use serde::{Deserialize, Serialize};

use crate::{api::error::ApiError, app::AppState};

/// `POST /validate` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateRequest {
    /// The session token. Falls back to the request's bearer header or cookie.
    #[serde(default)]
    pub token: Option<String>,
}

/// Claims returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedPayload {
    /// Subscriber id (`sub`).
    pub customer_id: String,
    /// Subscriber email.
    pub email: String,
    /// Paid plan.
    pub plan: Plan,
}

impl From<TokenClaims> for ValidatedPayload {
    fn from(claims: TokenClaims) -> Self {
        Self { customer_id: claims.sub, email: claims.email, plan: claims.plan }
    }
}

/// `POST /validate` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Always `true`; failures use [`ErrorResponse`](crate::api::error::ErrorResponse).
    pub valid: bool,
    /// The token's subject details.
    pub payload: ValidatedPayload,
}

/// `POST /validate`
///
/// Checks signature, claims and live entitlement. Failures carry
/// `valid: false` with 401, 402 or 500.
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let body_token = match payload {
        Ok(Json(request)) => request.token,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable validate body");
            return Err(ApiError::bad_request("Request body must be JSON").invalid());
        },
    };
    let token = body_token
        .filter(|token| !token.is_empty())
        .or_else(|| state.validator.extract_token(&headers))
        .unwrap_or_default();

    let claims = state
        .validator
        .verify_with_entitlement(&token, Utc::now())
        .await
        .map_err(|err| ApiError::from(err).invalid())?;

    Ok(Json(ValidateResponse { valid: true, payload: claims.into() }))
}
