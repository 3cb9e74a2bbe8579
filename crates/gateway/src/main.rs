//! Huddle gateway binary.
//!
//! Usage:
//!   huddle-gateway --config gateway.yaml
//!
//! Keys and subscription records are held in memory; a restart mints a new
//! signing key (or falls back to `HUDDLE_BOOTSTRAP_SECRET`) and relies on
//! webhook redelivery to repopulate subscriptions.

use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use huddle_authn::RotationScheduler;
use huddle_gateway::{AppState, GatewayConfig, build_router};
use huddle_storage::{auth::MemorySigningKeyStore, subscription::MemorySubscriptionStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Upper bound on the stale-record purge cadence.
const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[command(name = "huddle-gateway")]
#[command(about = "Subscription-gated session token gateway")]
struct Args {
    /// YAML override file (takes precedence over HUDDLE_CONFIG)
    #[arg(short, long, env = "HUDDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();

    let path = args.config.as_ref().map(|path| path.display().to_string());
    let config = GatewayConfig::load(|name| std::env::var(name).ok(), path.as_deref())?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown(
    config: GatewayConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let key_store = MemorySigningKeyStore::with_history_limit(config.auth.key_history_limit());
    let subscription_store = MemorySubscriptionStore::new();
    let state = AppState::new(Arc::new(key_store), Arc::new(subscription_store), config)?;

    // Sign with a stored key from the first request whenever the store allows it.
    if let Err(err) = state.keys.rotate_if_due(Utc::now()).await {
        tracing::warn!(error = %err, "Initial key rotation failed; relying on bootstrap key");
    }
    let scheduler =
        RotationScheduler::spawn(Arc::clone(&state.keys), state.config.rotation_check_interval);

    let subscriptions = state.subscriptions.clone();
    let purge_interval = state.config.auth.subscription_ttl().min(MAX_PURGE_INTERVAL);
    let purger = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = subscriptions.purge_stale(Utc::now()).await {
                tracing::warn!(error = %err, "Subscription purge failed");
            }
        }
    });

    let bind_addr = state.config.bind_addr;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("bind {bind_addr}"))?;
    info!(%bind_addr, "Huddle gateway listening");

    let app = build_router(state);
    let result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .with_context(|| "serve http");

    purger.abort();
    scheduler.shutdown().await;
    info!("Huddle gateway stopped");
    result
}
