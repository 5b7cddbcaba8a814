//! Dispatch error types and the structured failure payload.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use sidecar_sdk::engine::EngineError;
use sidecar_sdk::types::Capability;
use thiserror::Error;

/// Everything that can go wrong between an inbound request and an engine result.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed or missing request body or fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Engine identifier not present in the manifest (after sanitization).
    #[error("engine '{0}' not found in manifest")]
    NotFound(String),

    /// Manifest entry exists but its artifact cannot be materialized.
    #[error("engine '{engine}' could not be loaded: {reason}")]
    PluginLoad { engine: String, reason: String },

    /// A required capability is absent on an otherwise valid engine.
    #[error("engine '{engine}' does not implement '{capability}'")]
    CapabilityMissing {
        engine: String,
        capability: Capability,
    },

    /// Contained call exceeded its time, memory or concurrency ceiling.
    #[error("engine '{engine}' exceeded resource limit: {limit}")]
    ResourceExceeded { engine: String, limit: String },

    /// Any other fault raised inside engine execution.
    #[error("engine '{engine}' failed: {message}")]
    PluginFault { engine: String, message: String },

    /// The manifest could not be read or parsed.
    #[error("manifest unavailable: {0}")]
    Manifest(String),
}

impl DispatchError {
    /// Stable machine name of the error category, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::InvalidRequest(_) => "invalid_request",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::PluginLoad { .. } => "plugin_load",
            DispatchError::CapabilityMissing { .. } => "capability_missing",
            DispatchError::ResourceExceeded { .. } => "resource_exceeded",
            DispatchError::PluginFault { .. } => "plugin_fault",
            DispatchError::Manifest(_) => "manifest",
        }
    }

    pub fn plugin_load(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PluginLoad {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    pub fn resource_exceeded(engine: impl Into<String>, limit: impl Into<String>) -> Self {
        Self::ResourceExceeded {
            engine: engine.into(),
            limit: limit.into(),
        }
    }

    pub fn fault(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginFault {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Translate an engine-reported error raised while running `capability`.
    pub fn from_engine(engine: &str, capability: Capability, err: EngineError) -> Self {
        match err {
            EngineError::Unsupported(_) => Self::CapabilityMissing {
                engine: engine.to_string(),
                capability,
            },
            other => Self::fault(engine, other.to_string()),
        }
    }
}

/// The only failure shape callers ever see: `{"status":"error","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub status: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

impl From<&DispatchError> for ErrorPayload {
    fn from(err: &DispatchError) -> Self {
        Self::new(err.to_string())
    }
}

impl IntoResponse for ErrorPayload {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Result type alias using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_maps_to_capability_missing() {
        let err = DispatchError::from_engine(
            "mojeek",
            Capability::Web,
            EngineError::Unsupported(Capability::Web),
        );
        assert_eq!(err.kind(), "capability_missing");
        assert_eq!(err.to_string(), "engine 'mojeek' does not implement 'web'");
    }

    #[test]
    fn other_engine_errors_are_faults() {
        let err = DispatchError::from_engine(
            "brave",
            Capability::Web,
            EngineError::Fetch("connection reset".to_string()),
        );
        assert_eq!(err.kind(), "plugin_fault");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn payload_shape() {
        let payload = ErrorPayload::from(&DispatchError::NotFound("etcpasswd".to_string()));
        let json = serde_json::to_value(&payload).unwrap_or_default();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "engine 'etcpasswd' not found in manifest");
    }
}
