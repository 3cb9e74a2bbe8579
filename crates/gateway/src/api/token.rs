//! Session token minting, refresh and logout.
//!
//! Each of these responses sets or clears the session cookie.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use huddle_authn::{AuthError, Plan};
use huddle_storage::SubscriberId;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{api::error::ApiError, app::AppState, config::INTERNAL_TOKEN_HEADER};

/// `POST /token` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    /// Subscriber to mint for.
    pub customer_id: String,
    /// Subscriber email.
    pub email: String,
    /// Paid plan.
    pub plan: Plan,
}

/// `POST /token/refresh` body. The token may instead come from the bearer
/// header or the session cookie.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshRequest {
    /// The token to replace.
    #[serde(default)]
    pub token: Option<String>,
}

/// Body returned with a new token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// The signed token.
    pub token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// `Set-Cookie` value carrying `token`.
pub fn session_cookie(name: &str, token: &str, max_age_secs: u64) -> String {
    format!("{name}={token}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(name: &str) -> String {
    session_cookie(name, "", 0)
}

fn with_cookie(status: StatusCode, cookie: String, body: impl IntoResponse) -> Response {
    match HeaderValue::try_from(cookie) {
        Ok(value) => (status, [(header::SET_COOKIE, value)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Session cookie is not a valid header value");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "Internal error")
                .into_response()
        },
    }
}

fn issued(state: &AppState, token: String) -> Response {
    let expires_in = state.issuer.token_lifetime().as_secs();
    let cookie = session_cookie(state.config.auth.cookie_name(), &token, expires_in);
    with_cookie(StatusCode::OK, cookie, Json(TokenResponse { token, expires_in }))
}

fn internal_caller(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(presented) = headers.get(INTERNAL_TOKEN_HEADER) else {
        return false;
    };
    bool::from(presented.as_bytes().ct_eq(state.config.internal_token.as_bytes()))
}

/// `POST /token`
///
/// Internal: the caller proves itself with `X-Internal-Token`. Refuses with
/// 402 unless the subscriber currently holds a live subscription.
pub async fn mint(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<MintRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if !internal_caller(&state, &headers) {
        tracing::warn!("Token mint refused: bad internal token");
        return Err(ApiError::unauthorized());
    }
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable mint body");
        ApiError::bad_request("Body must be {customerId, email, plan}")
    })?;

    let now = Utc::now();
    let subscriber_id = SubscriberId::from(request.customer_id);
    if !state.subscriptions.has_entitlement(&subscriber_id, now).await? {
        return Err(AuthError::SubscriptionInactive.into());
    }

    let token = state.issuer.mint(&subscriber_id, &request.email, request.plan, now).await?;
    Ok(issued(&state, token))
}

/// `POST /token/refresh`
///
/// The presented token must verify and its subscriber must still be
/// entitled; the replacement is signed with the current key.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body_token = payload.ok().and_then(|Json(request)| request.token);
    let token = state
        .validator
        .extract_token(&headers)
        .or(body_token.filter(|token| !token.is_empty()))
        .ok_or(AuthError::MissingToken)?;

    let now = Utc::now();
    state.validator.verify_with_entitlement(&token, now).await?;
    let token = state.issuer.refresh(&token, now).await?;
    Ok(issued(&state, token))
}

/// `POST /logout`
pub async fn logout(State(state): State<AppState>) -> Response {
    with_cookie(
        StatusCode::NO_CONTENT,
        clear_session_cookie(state.config.auth.cookie_name()),
        (),
    )
}
