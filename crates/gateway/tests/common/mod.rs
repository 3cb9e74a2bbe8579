#![allow(dead_code, clippy::expect_used)]

use std::sync::Arc;

use axum::{Router, body::Body, http::Request};
use chrono::Utc;
use huddle_authn::testutil::Fixture;
use huddle_gateway::{AppState, GatewayConfig, build_router};
use huddle_storage::{
    subscription::MemorySubscriptionStore,
    testutil::FaultInjectingStore,
};

pub const WEBHOOK_SECRET: &str = "whsec_gateway_test";
pub const INTERNAL_TOKEN: &str = "internal-test-token";

pub fn test_config() -> GatewayConfig {
    GatewayConfig::builder()
        .webhook_secret(WEBHOOK_SECRET.to_owned())
        .internal_token(INTERNAL_TOKEN.to_owned())
        .build()
}

/// Gateway router over the fixture's stores. Tokens minted by
/// `fixture.issuer` verify against it.
pub async fn test_app() -> (Router, Fixture) {
    let fixture = Fixture::new(Utc::now()).await;
    let state = AppState::new(
        Arc::new(fixture.key_store.clone()),
        Arc::new(fixture.subscription_store.clone()),
        test_config(),
    )
    .expect("state");
    (build_router(state), fixture)
}

/// Gateway router whose subscription store can be cut off.
pub async fn faulty_app() -> (Router, Fixture, FaultInjectingStore<MemorySubscriptionStore>) {
    let fixture = Fixture::new(Utc::now()).await;
    let subscriptions = FaultInjectingStore::new(fixture.subscription_store.clone());
    let state = AppState::new(
        Arc::new(fixture.key_store.clone()),
        Arc::new(subscriptions.clone()),
        test_config(),
    )
    .expect("state");
    (build_router(state), fixture, subscriptions)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).expect("request")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
