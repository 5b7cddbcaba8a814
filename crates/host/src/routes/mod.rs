//! HTTP route handlers.
//!
//! Every response body is JSON. Failures are reported in the body, not the
//! status code, except for `/health`.

pub mod engines;
pub mod filters;
pub mod health;
pub mod search;

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use sidecar_sdk::types::ParameterSet;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::{DispatchError, DispatchResult, ErrorPayload};
use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(search::router())
        .merge(filters::router())
        .merge(engines::router())
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Body accepted by the dispatch endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundRequest {
    pub engine: Option<String>,
    pub page: Option<String>,
    pub params: Option<ParameterSet>,
}

impl InboundRequest {
    /// Parse a raw request body.
    pub fn parse(body: Result<Bytes, BytesRejection>) -> DispatchResult<Self> {
        let body = body.map_err(|e| DispatchError::InvalidRequest(e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(DispatchError::InvalidRequest(
                "request body is empty".to_string(),
            ));
        }
        serde_json::from_slice(&body)
            .map_err(|e| DispatchError::InvalidRequest(format!("malformed JSON body: {e}")))
    }

    /// The mandatory engine identifier, as sent.
    pub fn engine(&self) -> DispatchResult<&str> {
        self.engine
            .as_deref()
            .ok_or_else(|| DispatchError::InvalidRequest("missing field 'engine'".to_string()))
    }
}

/// Log a failed dispatch and render the structured failure payload.
pub(crate) fn error_response(engine: &str, err: &DispatchError) -> Response {
    log_failure(engine, err);
    ErrorPayload::from(err).into_response()
}

pub(crate) fn log_failure(engine: &str, err: &DispatchError) {
    match err {
        DispatchError::InvalidRequest(_) | DispatchError::NotFound(_) => {
            warn!(engine = %engine, kind = err.kind(), error = %err, "request rejected");
        }
        _ => {
            error!(engine = %engine, kind = err.kind(), error = %err, "dispatch failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(body: &str) -> DispatchResult<InboundRequest> {
        InboundRequest::parse(Ok(Bytes::from(body.to_string())))
    }

    #[test]
    fn parses_full_request() {
        let body = r#"{"engine":"mojeek","page":"web","params":{"s":"cats"}}"#;
        let request = parse(body).unwrap();
        assert_eq!(request.engine().unwrap(), "mojeek");
        assert_eq!(request.page.as_deref(), Some("web"));
        assert_eq!(request.params.unwrap()["s"], "cats");
    }

    #[test]
    fn engine_is_mandatory() {
        let request = parse(r#"{"params":{}}"#).unwrap();
        assert_eq!(request.engine().unwrap_err().kind(), "invalid_request");
    }

    #[test]
    fn malformed_bodies_are_invalid_requests() {
        for body in [
            "",
            "  ",
            "{",
            "[1,2]",
            r#"{"engine": 5}"#,
            r#"{"engine":"a","params":[1]}"#,
        ] {
            let err = parse(body).unwrap_err();
            assert_eq!(err.kind(), "invalid_request", "body {body:?}");
        }
    }
}
