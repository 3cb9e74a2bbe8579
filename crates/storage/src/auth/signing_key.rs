//! Symmetric signing key record.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{StorageError, StorageResult};

/// Minimum length, in bytes, of a decoded signing secret.
pub const MIN_SECRET_BYTES: usize = 32;

/// Lifecycle state of a [`SigningKey`].
///
/// ```text
/// ┌──────────┐  replace_active_key  ┌──────────┐
/// │  Active  │─────────────────────►│ Retired  │
/// └──────────┘                      └──────────┘
/// ```
///
/// A retired key never becomes active again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// The key currently used to sign new tokens.
    Active,
    /// A former active key, still usable for verification during the grace
    /// period that follows its retirement.
    Retired,
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Retired => f.write_str("retired"),
        }
    }
}

/// HMAC signing key shared between the token issuer and the validator.
///
/// The secret is the raw key material encoded as base64url without padding.
/// It is wrapped in [`Zeroizing`] so the encoded form is wiped on drop, and
/// the [`Debug`] impl redacts it so the secret never reaches a log line.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use huddle_storage::auth::{KeyStatus, SigningKey};
///
/// let key = SigningKey::builder()
///     .id("key-0001")
///     .secret("c2VjcmV0LXNlY3JldC1zZWNyZXQtc2VjcmV0LXNlY3JldA".to_owned())
///     .created_at(Utc::now())
///     .build();
///
/// assert_eq!(key.status, KeyStatus::Active);
/// assert!(key.retired_at.is_none());
/// assert!(!format!("{key:?}").contains("c2VjcmV0"));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct SigningKey {
    /// Key identifier, carried in the token header as `kid`.
    #[builder(into)]
    pub id: String,

    /// Secret key material (base64url, no padding).
    #[builder(into)]
    pub secret: Zeroizing<String>,

    /// When the key was generated.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    /// When the key stopped being the active key. `None` while active.
    pub retired_at: Option<DateTime<Utc>>,

    /// Current lifecycle state.
    #[builder(default = KeyStatus::Active)]
    pub status: KeyStatus,
}

impl SigningKey {
    /// Returns `true` if this is the key new tokens are signed with.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }

    /// Decodes the secret into raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored secret is not
    /// valid base64url, or is shorter than [`MIN_SECRET_BYTES`].
    pub fn secret_bytes(&self) -> StorageResult<Zeroizing<Vec<u8>>> {
        let bytes = Zeroizing::new(URL_SAFE_NO_PAD.decode(self.secret.as_bytes()).map_err(
            |e| StorageError::serialization_with_source(format!("key {} secret", self.id), e),
        )?);
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(StorageError::serialization(format!(
                "key {} secret is {} bytes, expected at least {MIN_SECRET_BYTES}",
                self.id,
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// How long the key has been retired at `now`, or `None` if it is active.
    #[must_use]
    pub fn retired_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.retired_at.map(|retired_at| now - retired_at)
    }

    /// Marks the key retired as of `at`. Idempotent: the first timestamp wins.
    pub fn retire(&mut self, at: DateTime<Utc>) {
        if self.status == KeyStatus::Active {
            self.status = KeyStatus::Retired;
            self.retired_at = Some(at);
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("retired_at", &self.retired_at)
            .field("status", &self.status)
            .finish()
    }
}
