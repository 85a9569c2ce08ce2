//! Common test utilities for API tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use smarthome_api::{create_router, ServerState};
use smarthome_commands::CommandManager;
use smarthome_core::config::HttpConfig;
use smarthome_core::{ManualClock, SequentialIds};
use smarthome_devices::{DeviceRegistry, StateTracker};
use smarthome_storage::Store;
use tower::ServiceExt;

pub const API_KEY: &str = "test-key";

pub struct TestApp {
    pub router: Router,
    pub state: ServerState,
    pub clock: Arc<ManualClock>,
}

/// Router over an in-memory store with a fixed clock and sequential ids.
pub fn test_app() -> TestApp {
    let store = Store::memory().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap(),
    ));
    let registry = DeviceRegistry::new(store.clone())
        .with_clock(clock.clone())
        .with_ids(Arc::new(SequentialIds::new("dev")));
    let commands = CommandManager::new(store.clone())
        .with_clock(clock.clone())
        .with_ids(Arc::new(SequentialIds::new("cmd")));
    let state = ServerState::with_services(
        registry,
        StateTracker::new(store.clone()),
        commands,
        store,
        API_KEY,
    );

    TestApp {
        router: create_router(state.clone(), &HttpConfig::default()),
        state,
        clock,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Authenticated request with an optional JSON body.
pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", API_KEY);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn create_device(router: &Router, external_id: &str) -> Value {
    let resp = send(
        router,
        request(
            "POST",
            "/api/v1/devices",
            Some(serde_json::json!({
                "name": "Thermostat",
                "type": "thermostat",
                "capabilities": ["setTemp"],
                "externalDeviceId": external_id,
            })),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    resp.json()
}
