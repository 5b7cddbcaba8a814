//! Engine discovery endpoint.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use super::error_response;
use crate::state::AppState;

/// List every engine the manifest declares, in manifest shape.
async fn list_engines(State(state): State<AppState>) -> Response {
    match state.registry().manifest() {
        Ok(manifest) => Json(manifest.to_raw()).into_response(),
        Err(e) => error_response("", &e),
    }
}

/// Create the engines router.
pub fn router() -> Router<AppState> {
    Router::new().route("/engines", get(list_engines))
}
