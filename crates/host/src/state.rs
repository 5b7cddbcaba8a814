//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::boundary::ExecutionBoundary;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::params::DefaultParams;
use crate::registry::{EngineCatalog, EngineRegistry, FileManifest, ManifestSource};
use crate::services::{ProxySelector, StateStore, ambient};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Resolves and invokes engines.
    dispatcher: Dispatcher,

    /// Contains every engine call.
    boundary: ExecutionBoundary,

    /// Manifest-backed engine registry (also held by the dispatcher).
    registry: Arc<EngineRegistry>,

    /// Token-keyed scrape sessions.
    sessions: Arc<StateStore>,

    /// Outbound proxy and User-Agent selection.
    selector: Arc<ProxySelector>,

    config: Config,
}

impl AppState {
    /// Build state reading the manifest from `config.manifest_path`.
    pub fn new(config: &Config, catalog: EngineCatalog) -> Result<Self> {
        Self::with_manifest_source(config, catalog, FileManifest::new(&config.manifest_path))
    }

    /// Build state with an explicit manifest source.
    pub fn with_manifest_source(
        config: &Config,
        catalog: EngineCatalog,
        source: impl ManifestSource + 'static,
    ) -> Result<Self> {
        let defaults = DefaultParams::load(config.default_params_path.as_deref())
            .context("failed to load default parameters")?;

        let registry = Arc::new(EngineRegistry::new(
            source,
            catalog,
            config.engines_dir.clone(),
        ));
        let selector = Arc::new(ProxySelector::from_config(config));
        let sessions = Arc::new(StateStore::new(
            config.session_ttl,
            config.session_max_capacity,
        ));

        info!(
            entry_points = registry.catalog().len(),
            proxies = selector.proxy_count(),
            session_ttl_secs = config.session_ttl.as_secs(),
            "engine host initialized"
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::new(defaults),
            ambient(Arc::clone(&sessions), Arc::clone(&selector)),
            Arc::clone(&selector),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                dispatcher,
                boundary: ExecutionBoundary::from_config(config),
                registry,
                sessions,
                selector,
                config: config.clone(),
            }),
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn boundary(&self) -> &ExecutionBoundary {
        &self.inner.boundary
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.inner.registry
    }

    pub fn sessions(&self) -> &Arc<StateStore> {
        &self.inner.sessions
    }

    pub fn selector(&self) -> &Arc<ProxySelector> {
        &self.inner.selector
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.inner.registry)
            .field("boundary", &self.inner.boundary)
            .finish()
    }
}
