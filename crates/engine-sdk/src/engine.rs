//! The capability contract every search engine implements.
//!
//! An engine is constructed per request by its registered [`EngineFactory`]
//! and may implement either or both capabilities. Unimplemented capabilities
//! report [`EngineError::Unsupported`]; the host decides whether that is
//! fatal (`web`) or defaulted (`filters`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::identity::OutboundIdentity;
use crate::services::AmbientServices;
use crate::types::{Capability, FilterSpec, ParameterSet, SearchResult};

/// Errors an engine may report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine does not implement this capability.
    #[error("engine does not implement '{0}'")]
    Unsupported(Capability),

    /// Upstream request failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Upstream response could not be understood.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Upstream served a captcha or rate-limit page.
    #[error("blocked by upstream: {0}")]
    Blocked(String),

    /// Reading an engine resource failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type alias using [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

/// Everything an engine instance may touch for the duration of one request.
///
/// There is no process-wide working directory or include path: an engine
/// locates its bundled resources through [`EngineContext::resource`].
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Sanitized engine identifier this instance serves.
    pub engine_id: String,
    /// Root directory engine resources are resolved against.
    pub resource_root: PathBuf,
    /// Artifact declared by the manifest, relative to `resource_root`.
    pub load_location: PathBuf,
    /// User-Agent and proxy chosen for this request.
    pub identity: OutboundIdentity,
    /// State store and proxy selector.
    pub services: AmbientServices,
    /// Sink for warnings and stray output.
    pub diagnostics: Diagnostics,
}

impl EngineContext {
    /// Resolve a path relative to the engine's resource root.
    pub fn resource(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.resource_root.join(relative)
    }
}

/// A search engine plugin.
pub trait SearchEngine {
    /// Describe the filters available for `page` (usually `"web"`).
    fn filters(&self, page: &str) -> EngineResult<FilterSpec> {
        let _ = page;
        Err(EngineError::Unsupported(Capability::Filters))
    }

    /// Run a web search with fully merged parameters.
    fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
        let _ = params;
        Err(EngineError::Unsupported(Capability::Web))
    }
}

/// Constructor registered under a manifest entry-point name.
#[derive(Clone)]
pub struct EngineFactory(
    Arc<dyn Fn(EngineContext) -> EngineResult<Box<dyn SearchEngine>> + Send + Sync>,
);

impl EngineFactory {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(EngineContext) -> EngineResult<Box<dyn SearchEngine>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Construct a fresh engine instance.
    pub fn build(&self, ctx: EngineContext) -> EngineResult<Box<dyn SearchEngine>> {
        (self.0)(ctx)
    }
}

impl fmt::Debug for EngineFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EngineFactory")
    }
}

/// Build a factory from an infallible constructor.
///
/// ```ignore
/// catalog.register("mojeek", factory(Mojeek::new));
/// ```
pub fn factory<E, F>(ctor: F) -> EngineFactory
where
    E: SearchEngine + 'static,
    F: Fn(EngineContext) -> E + Send + Sync + 'static,
{
    EngineFactory::new(move |ctx| Ok(Box::new(ctor(ctx)) as Box<dyn SearchEngine>))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::identity::ProxyIdentity;
    use crate::services::{ProxySource, SessionStore};
    use serde_json::json;

    struct NullServices;

    impl SessionStore for NullServices {
        fn store(&self, _url: &str, _kind: &str, _proxy: &ProxyIdentity) -> String {
            String::new()
        }
        fn get(&self, _token: &str, _kind: &str) -> (Option<String>, ProxyIdentity) {
            (None, ProxyIdentity::Direct)
        }
    }

    impl ProxySource for NullServices {
        fn select_proxy(&self) -> ProxyIdentity {
            ProxyIdentity::Direct
        }
    }

    fn context() -> EngineContext {
        let services = Arc::new(NullServices);
        EngineContext {
            engine_id: "test".to_string(),
            resource_root: PathBuf::from("/srv/engines"),
            load_location: PathBuf::from("test.toml"),
            identity: OutboundIdentity {
                user_agent: "ua".to_string(),
                proxy: ProxyIdentity::Direct,
            },
            services: AmbientServices::new(services.clone(), services),
            diagnostics: Diagnostics::default(),
        }
    }

    struct FiltersOnly;

    impl SearchEngine for FiltersOnly {
        fn filters(&self, _page: &str) -> EngineResult<FilterSpec> {
            Ok(json!({"nsfw": {"display": "NSFW"}}))
        }
    }

    #[test]
    fn default_capabilities_are_unsupported() {
        let mut engine = FiltersOnly;
        assert!(engine.filters("web").is_ok());
        let err = engine.web(&ParameterSet::new()).unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(Capability::Web)));
    }

    #[test]
    fn factory_builds_instances() {
        let f = factory(|_ctx| FiltersOnly);
        let engine = f.build(context()).unwrap();
        assert!(engine.filters("web").is_ok());
    }

    #[test]
    fn resource_joins_root() {
        let ctx = context();
        assert_eq!(
            ctx.resource("lib/parser.dat"),
            PathBuf::from("/srv/engines/lib/parser.dat")
        );
    }
}
