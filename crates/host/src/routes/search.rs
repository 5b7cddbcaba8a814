//! Web search endpoint.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::response::{IntoResponse, Response};
use axum::routing::post;

use super::{InboundRequest, error_response};
use crate::dispatch::sanitize_identifier;
use crate::state::AppState;

/// Run the engine's `web` capability and return its result verbatim.
async fn search(State(state): State<AppState>, body: Result<Bytes, BytesRejection>) -> Response {
    let request = match InboundRequest::parse(body) {
        Ok(request) => request,
        Err(e) => return error_response("", &e),
    };
    let engine = match request.engine() {
        Ok(engine) => engine.to_string(),
        Err(e) => return error_response("", &e),
    };
    let id = sanitize_identifier(&engine);
    let params = request.params.unwrap_or_default();

    let worker = state.clone();
    let outcome = state
        .boundary()
        .run(&id, move |diagnostics| {
            worker
                .dispatcher()
                .dispatch_search(&engine, &params, diagnostics)
        })
        .await;

    match outcome {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(&id, &e),
    }
}

/// Create the search router.
pub fn router() -> Router<AppState> {
    Router::new().route("/search", post(search))
}
