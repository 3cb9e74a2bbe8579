//! # Huddle Gateway
//!
//! HTTP front end for [`huddle_authn`]: central token validation, key
//! metadata, internal token minting and the payment provider webhook.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /validate` | Signature, claims and entitlement check for downstream services |
//! | `GET /jwks` | Active and in-grace key metadata (no secrets) |
//! | `POST /token` | Mint a session token (requires `X-Internal-Token`) |
//! | `POST /token/refresh` | Replace a valid token with one signed by the current key |
//! | `POST /logout` | Clear the session cookie |
//! | `POST /webhooks/stripe` | Subscription lifecycle events |
//! | `GET /health` | Liveness |

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod config;

pub use app::{AppState, build_router};
pub use config::GatewayConfig;
