//! Verification key metadata.
//!
//! Keys are symmetric, so this lists ids and lifecycle timestamps only.
//! Services that verify locally receive key material out of band.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use huddle_storage::auth::{KeyStatus, SigningKey};
use serde::{Deserialize, Serialize};

use crate::{api::error::ApiError, app::AppState};

/// One verification key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkMetadata {
    /// Key id, as carried in token headers.
    pub kid: String,
    /// Always `HS256`.
    pub alg: String,
    /// Always `sig`.
    #[serde(rename = "use")]
    pub key_use: String,
    /// `active` or `retired`.
    pub status: KeyStatus,
    /// When the key was generated.
    pub created_at: DateTime<Utc>,
    /// When the key was retired, if it has been.
    pub retired_at: Option<DateTime<Utc>>,
}

impl From<&SigningKey> for JwkMetadata {
    fn from(key: &SigningKey) -> Self {
        Self {
            kid: key.id.clone(),
            alg: "HS256".to_owned(),
            key_use: "sig".to_owned(),
            status: key.status,
            created_at: key.created_at,
            retired_at: key.retired_at,
        }
    }
}

/// `GET /jwks` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwksResponse {
    /// Active key first, then retired keys still in grace.
    pub keys: Vec<JwkMetadata>,
}

/// `GET /jwks`
pub async fn jwks(State(state): State<AppState>) -> Result<Json<JwksResponse>, ApiError> {
    let keys = state.keys.get_verification_keys(Utc::now()).await?;
    Ok(Json(JwksResponse { keys: keys.iter().map(JwkMetadata::from).collect() }))
}
