//! Shared handler state and router assembly.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use chrono::Utc;
use huddle_authn::{
    BootstrapKeyProvider, KeyRotationManager, SubscriptionCache, TokenIssuer, TokenValidator,
};
use huddle_storage::{auth::SigningKeyStore, subscription::SubscriptionStore};
use tower_http::trace::TraceLayer;

use crate::{api, config::GatewayConfig};

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Signing key lifecycle.
    pub keys: Arc<KeyRotationManager>,
    /// Token minting.
    pub issuer: TokenIssuer,
    /// Token verification.
    pub validator: TokenValidator,
    /// Subscription status mirror.
    pub subscriptions: SubscriptionCache,
    /// Gateway settings.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Wires the token components over the given stores.
    ///
    /// # Errors
    ///
    /// Fails if the configured bootstrap secret is too short.
    pub fn new(
        key_store: Arc<dyn SigningKeyStore>,
        subscription_store: Arc<dyn SubscriptionStore>,
        config: GatewayConfig,
    ) -> Result<Self> {
        let mut keys = KeyRotationManager::new(key_store, config.auth.clone());
        if let Some(secret) = &config.bootstrap_secret {
            let bootstrap = BootstrapKeyProvider::new(secret.clone(), Utc::now())
                .with_context(|| "load bootstrap secret")?;
            keys = keys.with_bootstrap(bootstrap);
        }
        let keys = Arc::new(keys);

        let subscriptions = SubscriptionCache::from_config(subscription_store, &config.auth);
        Ok(Self {
            issuer: TokenIssuer::new(Arc::clone(&keys)),
            validator: TokenValidator::new(Arc::clone(&keys), subscriptions.clone()),
            keys,
            subscriptions,
            config: Arc::new(config),
        })
    }
}

/// Builds the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        .route("/validate", post(api::validate::validate))
        .route("/jwks", get(api::jwks::jwks))
        .route("/token", post(api::token::mint))
        .route("/token/refresh", post(api::token::refresh))
        .route("/logout", post(api::token::logout))
        .route("/webhooks/stripe", post(api::webhook::stripe))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
        .with_state(state)
}
