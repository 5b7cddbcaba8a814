//! Engine catalog - entry-point name to factory.
//!
//! Engines are compiled into the host and registered here at startup. The
//! manifest's `class` field selects which factory materializes an engine.

use std::collections::HashMap;

use sidecar_sdk::engine::EngineFactory;
use tracing::warn;

/// Registered engine factories, indexed by entry-point name.
#[derive(Debug, Clone, Default)]
pub struct EngineCatalog {
    factories: HashMap<String, EngineFactory>,
}

impl EngineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A later registration under the same name wins.
    pub fn register(
        &mut self,
        entry_point: impl Into<String>,
        factory: EngineFactory,
    ) -> &mut Self {
        let entry_point = entry_point.into();
        if self.factories.insert(entry_point.clone(), factory).is_some() {
            warn!(entry_point = %entry_point, "engine factory registered twice, replacing");
        }
        self
    }

    /// Builder-style registration.
    pub fn with(mut self, entry_point: impl Into<String>, factory: EngineFactory) -> Self {
        self.register(entry_point, factory);
        self
    }

    pub fn get(&self, entry_point: &str) -> Option<&EngineFactory> {
        self.factories.get(entry_point)
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.factories.contains_key(entry_point)
    }

    /// Registered entry-point names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_sdk::engine::{SearchEngine, factory};

    struct Nothing;
    impl SearchEngine for Nothing {}

    #[test]
    fn register_and_lookup() {
        let catalog = EngineCatalog::new()
            .with("mojeek", factory(|_| Nothing))
            .with("brave", factory(|_| Nothing));

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("mojeek"));
        assert!(catalog.get("google").is_none());
        assert_eq!(catalog.names(), vec!["brave", "mojeek"]);
    }

    #[test]
    fn later_registration_replaces() {
        let mut catalog = EngineCatalog::new();
        catalog.register("mojeek", factory(|_| Nothing));
        catalog.register("mojeek", factory(|_| Nothing));
        assert_eq!(catalog.len(), 1);
    }
}
