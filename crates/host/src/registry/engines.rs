//! Engine registry - resolves identifiers to constructible engines.
//!
//! The manifest is loaded lazily on first use and cached for the life of the
//! process. Concurrent first loads may each read the source; the first one to
//! store its copy wins and the rest are discarded.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use sidecar_sdk::engine::EngineFactory;
use tracing::{debug, error, info};

use super::catalog::EngineCatalog;
use super::manifest::{Manifest, ManifestEntry, ManifestSource, contained_path};
use crate::error::{DispatchError, DispatchResult};

/// A fully resolved engine, ready to be constructed.
#[derive(Debug, Clone)]
pub struct ResolvedEngine {
    /// The manifest entry that declared it.
    pub entry: ManifestEntry,
    /// Factory registered under the entry point.
    pub factory: EngineFactory,
    /// Root the engine resolves its resources against.
    pub resource_root: PathBuf,
    /// Absolute location of the declared artifact.
    pub artifact: PathBuf,
}

/// Registry mapping engine identifiers to factories via the manifest.
pub struct EngineRegistry {
    source: Box<dyn ManifestSource>,
    catalog: EngineCatalog,
    engines_dir: PathBuf,
    /// Cached manifest; `None` until first load or after `invalidate`.
    ///
    /// Uses `parking_lot::RwLock` so a panicking reader can never poison it.
    cached: RwLock<Option<Arc<Manifest>>>,
}

impl EngineRegistry {
    pub fn new(
        source: impl ManifestSource + 'static,
        catalog: EngineCatalog,
        engines_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: Box::new(source),
            catalog,
            engines_dir: engines_dir.into(),
            cached: RwLock::new(None),
        }
    }

    /// Get the manifest, loading it on first use.
    pub fn manifest(&self) -> DispatchResult<Arc<Manifest>> {
        if let Some(manifest) = self.cached.read().as_ref() {
            return Ok(Arc::clone(manifest));
        }

        let loaded = self.source.load().map_err(|e| {
            let message = format!("{e:#}");
            error!(source = %self.source.describe(), error = %message, "failed to load manifest");
            DispatchError::Manifest(message)
        })?;

        let mut slot = self.cached.write();
        let manifest = slot.get_or_insert_with(|| {
            info!(
                source = %self.source.describe(),
                engines = loaded.len(),
                "manifest loaded"
            );
            Arc::new(loaded)
        });
        Ok(Arc::clone(manifest))
    }

    /// Drop the cached manifest so the next lookup reloads it.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
        debug!("manifest cache invalidated");
    }

    /// Whether the manifest has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.cached.read().is_some()
    }

    /// Resolve an identifier to a constructible engine.
    ///
    /// Either everything needed to construct the engine is present or the
    /// call fails; nothing is partially loaded.
    pub fn resolve(&self, identifier: &str) -> DispatchResult<ResolvedEngine> {
        let manifest = self.manifest()?;

        let entry = manifest
            .get(identifier)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound(identifier.to_string()))?;

        let artifact = contained_path(&self.engines_dir, &entry.load_location).ok_or_else(|| {
            DispatchError::plugin_load(
                identifier,
                format!(
                    "load location '{}' is outside the engines root",
                    entry.load_location.display()
                ),
            )
        })?;

        if !artifact.is_file() {
            return Err(DispatchError::plugin_load(
                identifier,
                format!("engine file not found: {}", entry.load_location.display()),
            ));
        }

        let factory = self
            .catalog
            .get(&entry.entry_point)
            .cloned()
            .ok_or_else(|| {
                DispatchError::plugin_load(
                    identifier,
                    format!("entry point '{}' is not registered", entry.entry_point),
                )
            })?;

        debug!(engine = %identifier, entry_point = %entry.entry_point, "engine resolved");

        Ok(ResolvedEngine {
            entry,
            factory,
            resource_root: self.engines_dir.clone(),
            artifact,
        })
    }

    /// Identifiers declared by the manifest, sorted.
    pub fn identifiers(&self) -> DispatchResult<Vec<String>> {
        Ok(self
            .manifest()?
            .identifiers()
            .map(|s| s.to_string())
            .collect())
    }

    /// Try to resolve every manifest entry, returning each outcome.
    pub fn check_all(&self) -> DispatchResult<Vec<(ManifestEntry, DispatchResult<()>)>> {
        let manifest = self.manifest()?;
        Ok(manifest
            .entries()
            .map(|entry| {
                let outcome = self.resolve(&entry.identifier).map(|_| ());
                (entry.clone(), outcome)
            })
            .collect())
    }

    pub fn catalog(&self) -> &EngineCatalog {
        &self.catalog
    }

    pub fn engines_dir(&self) -> &std::path::Path {
        &self.engines_dir
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("source", &self.source.describe())
            .field("engines_dir", &self.engines_dir)
            .field("entry_points", &self.catalog.names())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::registry::manifest::StaticManifest;
    use sidecar_sdk::engine::{SearchEngine, factory};
    use sidecar_test_utils::TestDir;

    struct Nothing;
    impl SearchEngine for Nothing {}

    fn entry(id: &str, file: &str, class: &str) -> ManifestEntry {
        ManifestEntry {
            identifier: id.to_string(),
            load_location: PathBuf::from(file),
            entry_point: class.to_string(),
        }
    }

    fn registry(dir: &Path, entries: Vec<ManifestEntry>) -> EngineRegistry {
        let catalog = EngineCatalog::new().with("mojeek", factory(|_| Nothing));
        EngineRegistry::new(StaticManifest(Manifest::from_entries(entries)), catalog, dir)
    }

    /// Counts loads so caching can be observed.
    struct CountingSource {
        loads: Arc<AtomicUsize>,
        manifest: Manifest,
    }

    impl ManifestSource for CountingSource {
        fn load(&self) -> anyhow::Result<Manifest> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.manifest.clone())
        }
        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    struct BrokenSource;

    impl ManifestSource for BrokenSource {
        fn load(&self) -> anyhow::Result<Manifest> {
            anyhow::bail!("disk on fire")
        }
        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    #[test]
    fn resolves_declared_engine() {
        let dir = TestDir::new("registry_resolve");
        dir.touch("engines/mojeek.php");
        let registry = registry(&dir, vec![entry("mojeek", "engines/mojeek.php", "mojeek")]);

        let resolved = registry.resolve("mojeek").unwrap();
        assert_eq!(resolved.entry.entry_point, "mojeek");
        assert_eq!(resolved.artifact, dir.join("engines/mojeek.php"));
        assert_eq!(resolved.resource_root, dir.to_path_buf());
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let dir = TestDir::new("registry_unknown");
        let registry = registry(&dir, vec![]);
        assert!(matches!(
            registry.resolve("google"),
            Err(DispatchError::NotFound(id)) if id == "google"
        ));
    }

    #[test]
    fn missing_file_is_load_error() {
        let dir = TestDir::new("registry_missing_file");
        let registry = registry(&dir, vec![entry("mojeek", "engines/mojeek.php", "mojeek")]);
        let err = registry.resolve("mojeek").unwrap_err();
        assert_eq!(err.kind(), "plugin_load");
        assert!(err.to_string().contains("engine file not found"));
    }

    #[test]
    fn unregistered_entry_point_is_load_error() {
        let dir = TestDir::new("registry_no_factory");
        dir.touch("engines/brave.php");
        let registry = registry(&dir, vec![entry("brave", "engines/brave.php", "brave")]);
        let err = registry.resolve("brave").unwrap_err();
        assert_eq!(err.kind(), "plugin_load");
        assert!(err.to_string().contains("entry point 'brave'"));
    }

    #[test]
    fn escaping_load_location_is_rejected() {
        let dir = TestDir::new("registry_escape");
        let registry = registry(
            &dir,
            vec![
                entry("up", "../outside.php", "mojeek"),
                entry("abs", "/etc/passwd", "mojeek"),
            ],
        );
        for id in ["up", "abs"] {
            let err = registry.resolve(id).unwrap_err();
            assert!(err.to_string().contains("outside the engines root"), "{err}");
        }
    }

    #[test]
    fn manifest_is_loaded_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let dir = TestDir::new("registry_cache");
        let registry = EngineRegistry::new(
            CountingSource {
                loads: loads.clone(),
                manifest: Manifest::from_entries(vec![entry("mojeek", "m.php", "mojeek")]),
            },
            EngineCatalog::new(),
            dir.to_path_buf(),
        );

        assert!(!registry.is_loaded());
        for _ in 0..5 {
            let _ = registry.resolve("mojeek");
            let _ = registry.identifiers();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        registry.invalidate();
        let _ = registry.identifiers();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_first_access_settles_on_one_copy() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(EngineRegistry::new(
            CountingSource {
                loads: loads.clone(),
                manifest: Manifest::from_entries(vec![entry("mojeek", "m.php", "mojeek")]),
            },
            EngineCatalog::new(),
            "/nonexistent",
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.manifest().unwrap())
            })
            .collect();
        let copies: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let first = registry.manifest().unwrap();
        assert!(copies.iter().all(|m| Arc::ptr_eq(m, &first)));
        assert!(loads.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn broken_source_is_manifest_error_and_not_cached() {
        let registry = EngineRegistry::new(BrokenSource, EngineCatalog::new(), "/nonexistent");
        let err = registry.resolve("mojeek").unwrap_err();
        assert_eq!(err.kind(), "manifest");
        assert!(err.to_string().contains("disk on fire"));
        assert!(!registry.is_loaded());
    }

    #[test]
    fn check_all_reports_each_entry() {
        let dir = TestDir::new("registry_check_all");
        dir.touch("engines/mojeek.php");
        let registry = registry(
            &dir,
            vec![
                entry("mojeek", "engines/mojeek.php", "mojeek"),
                entry("brave", "engines/brave.php", "brave"),
            ],
        );

        let outcomes = registry.check_all().unwrap();
        assert_eq!(outcomes.len(), 2);
        for (entry, outcome) in outcomes {
            match entry.identifier.as_str() {
                "mojeek" => assert!(outcome.is_ok()),
                "brave" => assert!(outcome.is_err()),
                other => panic!("unexpected entry {other}"),
            }
        }
    }
}
