//! Signing key types and storage.
//!
//! Keys are symmetric HMAC secrets shared by the token issuer and the
//! validator. At most one key is active at a time; retired keys stay in the
//! [`KeyRing`] history so tokens they signed keep verifying through the
//! rotation grace period.
//!
//! # Storage Trait
//!
//! The [`SigningKeyStore`] trait provides the interface for reading the ring
//! and atomically installing a new active key. Use [`MemorySigningKeyStore`]
//! for tests and single-process deployments.
//!
//! # Examples
//!
//! ```no_run
//! use chrono::Utc;
//! use huddle_storage::auth::{MemorySigningKeyStore, SigningKey, SigningKeyStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = MemorySigningKeyStore::new();
//!
//! let key = SigningKey::builder()
//!     .id("key-0001")
//!     .secret("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8".to_owned())
//!     .build();
//!
//! let now = Utc::now();
//! store.replace_active_key(&key, now, now).await.unwrap();
//! assert!(store.get_active_key().await.unwrap().is_some());
//! # });
//! ```

mod key_ring;
mod signing_key;
mod store;

pub use key_ring::{DEFAULT_KEY_HISTORY_LIMIT, KeyRing};
pub use signing_key::{KeyStatus, MIN_SECRET_BYTES, SigningKey};
pub use store::{MemorySigningKeyStore, SigningKeyStore};
