//! HTTP error responses.
//!
//! Every handler failure becomes an [`ApiError`]: a status code plus a JSON
//! body with a stable `code` and a fixed public message. The detail carried
//! by [`AuthError`] and [`WebhookError`] is logged here and never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use huddle_authn::{AuthError, WebhookError};
use serde::{Deserialize, Serialize};

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Present (and `false`) on `/validate` responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code.
    pub code: String,
}

/// Handler error: status plus body.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub body: ErrorResponse,
}

impl ApiError {
    /// Builds an error with no `valid` field.
    pub fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            body: ErrorResponse { valid: None, error: message.to_owned(), code: code.to_owned() },
        }
    }

    /// 400 with code `INVALID_REQUEST`.
    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    /// 401 with code `UNAUTHORIZED`, for a wrong or absent internal token.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Unauthorized")
    }

    /// Marks the body as a failed validation result (`valid: false`).
    #[must_use]
    pub fn invalid(mut self) -> Self {
        self.body.valid = Some(false);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let (status, message) = match &err {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing token"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::ClaimMismatch(_) => (StatusCode::UNAUTHORIZED, "Token not valid for this service"),
            AuthError::SubscriptionInactive => {
                (StatusCode::PAYMENT_REQUIRED, "Subscription inactive")
            },
            AuthError::UpstreamUnavailable(_) | AuthError::NoSigningKey => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication service unavailable")
            },
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };

        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "Request failed");
        } else if err.is_credential_error() {
            tracing::debug!(code = err.code(), error = %err, "Credential rejected");
        } else {
            tracing::info!(code = err.code(), "Access denied");
        }

        Self::new(status, err.code(), message)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        tracing::warn!(error = %err, "Webhook rejected");
        match err {
            WebhookError::MalformedPayload(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", "Invalid webhook payload")
            },
            _ => Self::new(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid webhook signature"),
        }
    }
}
