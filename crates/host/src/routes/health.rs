//! Health check endpoint.
//!
//! Returns 200 OK if the manifest can be loaded, 503 Service Unavailable
//! otherwise.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    manifest: bool,
    engines: usize,
    in_flight: usize,
    sessions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (engines, error) = match state.registry().manifest() {
        Ok(manifest) => (manifest.len(), None),
        Err(e) => (0, Some(e.to_string())),
    };
    let manifest = error.is_none();

    let status_code = if manifest {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if manifest { "healthy" } else { "unhealthy" },
            manifest,
            engines,
            in_flight: state.boundary().in_flight(),
            sessions: state.sessions().entry_count(),
            error,
        }),
    )
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
