//! Storage for the Huddle token gateway.
//!
//! This crate owns the two pieces of durable state the gateway depends on:
//! the signing key ring used to mint and verify session tokens, and the
//! local mirror of each subscriber's billing status.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    huddle-gateway (HTTP)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       huddle-authn                          │
//! │  KeyRotationManager │ TokenIssuer │ TokenValidator │ Cache  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      huddle-storage                         │
//! │        SigningKeyStore         │     SubscriptionStore      │
//! ├────────────────────────────────┴────────────────────────────┤
//! │   MemorySigningKeyStore / MemorySubscriptionStore (tests,   │
//! │   single node) or a durable backend implementing the traits │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Backends must report an
//! unreachable store as an error, never as an empty result, so the token
//! layer can fail closed.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with record factories, a fault-injecting store
//!   wrapper and assertion macros. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod subscription;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod types;

pub use error::{BoxError, StorageError, StorageResult};
pub use types::SubscriberId;
pub use zeroize::Zeroizing;
