//! HTTP handlers.

pub mod error;
pub mod health;
pub mod jwks;
pub mod token;
pub mod validate;
pub mod webhook;
