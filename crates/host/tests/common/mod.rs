#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Each [`TestApp`] owns a scratch directory holding a manifest and one
//! artifact per fake engine, and drives the real router in-process.

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use sidecar_test_utils::{TestDir, engines};
use tower::ServiceExt;

use sidecar_host::config::Config;
use sidecar_host::registry::EngineCatalog;
use sidecar_host::routes;
use sidecar_host::state::AppState;

/// Test application wrapping the router and its fixture directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TestDir,
}

impl TestApp {
    /// App with every fake engine declared and installed.
    pub fn new(name: &str) -> Self {
        let dir = TestDir::new(name);
        dir.write("manifest.json", &engines::manifest_json());
        for id in engines::IDENTIFIERS {
            dir.touch(format!("engines/{id}.php"));
        }
        Self::with_dir(dir)
    }

    /// App over an already populated directory.
    pub fn with_dir(dir: TestDir) -> Self {
        let config = Config {
            manifest_path: dir.join("manifest.json"),
            engines_dir: dir.to_path_buf(),
            dispatch_timeout: Duration::from_millis(500),
            max_result_bytes: 16 * 1024,
            max_concurrent_dispatches: 8,
            ..Config::default()
        };

        let mut catalog = EngineCatalog::new();
        for (name, factory) in engines::all() {
            catalog.register(name, factory);
        }

        let state = AppState::new(&config, catalog).expect("Failed to build app state");
        Self {
            router: routes::router(state.clone()),
            state,
            dir,
        }
    }

    /// Send a request through the router.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// POST a raw body and return status plus parsed JSON.
    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.request(request).await;
        split(response).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, &body.to_string()).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.request(request).await;
        split(response).await
    }
}

/// Status and JSON body of a response, asserting the body is JSON.
pub async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(
        content_type.starts_with("application/json"),
        "unexpected content type {content_type:?}"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).expect("response body is not JSON");
    (status, body)
}

/// Assert `body` is the structured failure payload.
pub fn assert_error(body: &Value) -> &str {
    assert_eq!(body["status"], "error", "not an error payload: {body}");
    assert_eq!(body.as_object().map(|o| o.len()), Some(2), "extra fields: {body}");
    body["message"].as_str().expect("message is a string")
}
