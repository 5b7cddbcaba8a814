//! Filter discovery endpoint.
//!
//! Failures degrade to an empty filter set rather than an error payload, so
//! a front end can always render its search form.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::routing::post;
use serde_json::{Map, Value};
use sidecar_sdk::types::FilterSpec;

use super::{InboundRequest, log_failure};
use crate::dispatch::{DEFAULT_PAGE, sanitize_identifier};
use crate::state::AppState;

/// Describe the filters an engine offers for a page.
async fn filters(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Json<FilterSpec> {
    let request = match InboundRequest::parse(body) {
        Ok(request) => request,
        Err(e) => {
            log_failure("", &e);
            return empty();
        }
    };
    let engine = match request.engine() {
        Ok(engine) => engine.to_string(),
        Err(e) => {
            log_failure("", &e);
            return empty();
        }
    };
    let id = sanitize_identifier(&engine);
    let page = request.page.unwrap_or_else(|| DEFAULT_PAGE.to_string());

    let worker = state.clone();
    let outcome = state
        .boundary()
        .run(&id, move |diagnostics| {
            worker
                .dispatcher()
                .dispatch_filters(&engine, &page, diagnostics)
        })
        .await;

    match outcome {
        Ok(spec) => Json(spec),
        Err(e) => {
            log_failure(&id, &e);
            empty()
        }
    }
}

fn empty() -> Json<FilterSpec> {
    Json(Value::Object(Map::new()))
}

/// Create the filters router.
pub fn router() -> Router<AppState> {
    Router::new().route("/filters", post(filters))
}
