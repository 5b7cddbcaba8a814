//! Engine dispatcher - resolves an engine and invokes one capability.
//!
//! The dispatcher runs synchronously inside a contained call (see
//! [`crate::boundary`]); it reports failures as [`DispatchError`] and never
//! catches faults itself.

use std::sync::Arc;

use serde_json::Value;
use sidecar_sdk::diagnostics::Diagnostics;
use sidecar_sdk::engine::{EngineContext, EngineError, SearchEngine};
use sidecar_sdk::services::AmbientServices;
use sidecar_sdk::types::{Capability, FilterSpec, ParameterSet, SearchResult};
use tracing::{debug, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::params::{DefaultParams, validate_scalars};
use crate::registry::EngineRegistry;
use crate::services::ProxySelector;

/// Page used when a filters request names none.
pub const DEFAULT_PAGE: &str = "web";

/// Strip every character outside `[a-z0-9_]`.
///
/// Idempotent; the output always matches `^[a-z0-9_]*$`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Dispatcher for engine capabilities.
pub struct Dispatcher {
    registry: Arc<EngineRegistry>,
    defaults: Arc<DefaultParams>,
    services: AmbientServices,
    selector: Arc<ProxySelector>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<EngineRegistry>,
        defaults: Arc<DefaultParams>,
        services: AmbientServices,
        selector: Arc<ProxySelector>,
    ) -> Self {
        Self {
            registry,
            defaults,
            services,
            selector,
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn defaults(&self) -> &DefaultParams {
        &self.defaults
    }

    /// Describe the filters an engine offers for `page`.
    ///
    /// Engines without the filters capability yield an empty object.
    pub fn dispatch_filters(
        &self,
        engine_id: &str,
        page: &str,
        diagnostics: &Diagnostics,
    ) -> DispatchResult<FilterSpec> {
        let (id, engine) = self.instantiate(engine_id, diagnostics)?;

        match engine.filters(page) {
            Ok(spec) => Ok(spec),
            Err(EngineError::Unsupported(_)) => {
                debug!(engine = %id, page = %page, "engine has no filters, using empty spec");
                Ok(Value::Object(Default::default()))
            }
            Err(e) => Err(DispatchError::from_engine(&id, Capability::Filters, e)),
        }
    }

    /// Run a web search with request parameters merged over the defaults.
    pub fn dispatch_search(
        &self,
        engine_id: &str,
        params: &ParameterSet,
        diagnostics: &Diagnostics,
    ) -> DispatchResult<SearchResult> {
        validate_scalars(params)?;
        let (id, mut engine) = self.instantiate(engine_id, diagnostics)?;
        let params = self.defaults.resolve(params);

        let result = engine
            .web(&params)
            .map_err(|e| DispatchError::from_engine(&id, Capability::Web, e))?;

        let count = result
            .get("web")
            .and_then(|w| w.as_array())
            .map_or(0, |w| w.len());
        if count == 0 {
            warn!(engine = %id, "engine returned 0 results");
        } else {
            debug!(engine = %id, results = count, "search complete");
        }

        Ok(result)
    }

    /// Sanitize, resolve and construct a fresh engine instance.
    fn instantiate(
        &self,
        engine_id: &str,
        diagnostics: &Diagnostics,
    ) -> DispatchResult<(String, Box<dyn SearchEngine>)> {
        let id = sanitize_identifier(engine_id);
        if id.is_empty() {
            return Err(DispatchError::NotFound(id));
        }

        let resolved = self.registry.resolve(&id)?;

        let ctx = EngineContext {
            engine_id: id.clone(),
            resource_root: resolved.resource_root,
            load_location: resolved.entry.load_location,
            identity: self.selector.identity(),
            services: self.services.clone(),
            diagnostics: diagnostics.clone(),
        };

        let entry_point = &resolved.entry.entry_point;
        let engine = resolved.factory.build(ctx).map_err(|e| {
            DispatchError::plugin_load(&id, format!("entry point '{entry_point}' failed: {e}"))
        })?;

        Ok((id, engine))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("selector", &self.selector)
            .finish()
    }
}
