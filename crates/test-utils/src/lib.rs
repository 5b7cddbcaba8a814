//! Sidecar test utilities.
//!
//! Temporary directories for manifest and engine fixtures, plus a catalog
//! of fake engines that exercise every failure mode the host must contain.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A scratch directory under the system temp dir, removed on drop.
#[derive(Debug)]
pub struct TestDir(PathBuf);

impl TestDir {
    pub fn new(name: &str) -> Self {
        let n = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join(format!("sidecar_test_{name}_{n}_{}", std::process::id()));
        // Remove leftovers from a previous run, if any
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    /// Create an empty file (and its parents) at `relative`.
    pub fn touch(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.write(relative, "")
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.0.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }
}

impl Deref for TestDir {
    type Target = Path;
    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for TestDir {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Fake engines keyed by the entry point they register under.
///
/// Every engine is declared in [`engines::manifest_json`] under an identifier
/// of the same name; `mojeek` is served by the echo engine.
pub mod engines {
    use std::io::Write;
    use std::time::Duration;

    use serde_json::{Value, json};
    use sidecar_sdk::prelude::*;

    /// Every fake engine, as `(entry point, factory)` pairs.
    pub fn all() -> Vec<(&'static str, EngineFactory)> {
        vec![
            ("mojeek", sidecar_echo::factory()),
            ("params", factory(|_| Params)),
            ("web_only", factory(|_| WebOnly)),
            ("filters_only", factory(|_| FiltersOnly)),
            ("faulty", factory(|_| Faulty)),
            (
                "unbuildable",
                EngineFactory::new(|_| Err(EngineError::other("missing parser table"))),
            ),
            ("session", factory(|ctx| Session { ctx })),
            ("noisy", factory(|ctx| Noisy { ctx })),
            ("panicking", factory(|_| Panicking)),
            ("slow", factory(|_| Slow)),
            ("oversized", factory(|_| Oversized)),
        ]
    }

    /// Identifiers declared by [`manifest_json`].
    pub const IDENTIFIERS: &[&str] = &[
        "mojeek",
        "params",
        "web_only",
        "filters_only",
        "faulty",
        "unbuildable",
        "session",
        "noisy",
        "panicking",
        "slow",
        "oversized",
    ];

    /// Manifest declaring every fake engine at `engines/<id>.php`.
    pub fn manifest_json() -> String {
        let mut manifest = serde_json::Map::new();
        for id in IDENTIFIERS {
            manifest.insert(
                id.to_string(),
                json!({ "file": format!("engines/{id}.php"), "class": id }),
            );
        }
        Value::Object(manifest).to_string()
    }

    /// Returns the merged parameters it was handed.
    struct Params;

    impl SearchEngine for Params {
        fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
            Ok(json!({ "web": [], "params": params }))
        }
    }

    struct WebOnly;

    impl SearchEngine for WebOnly {
        fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
            Ok(json!({ "web": [{ "title": param_str(params, "s", "") }] }))
        }
    }

    struct FiltersOnly;

    impl SearchEngine for FiltersOnly {
        fn filters(&self, _page: &str) -> EngineResult<FilterSpec> {
            Ok(json!({ "country": { "display": "Country", "option": { "us": "US" } } }))
        }
    }

    struct Faulty;

    impl SearchEngine for Faulty {
        fn filters(&self, _page: &str) -> EngineResult<FilterSpec> {
            Err(EngineError::Parse("unexpected markup".to_string()))
        }

        fn web(&mut self, _params: &ParameterSet) -> EngineResult<SearchResult> {
            Err(EngineError::Fetch("upstream returned 502".to_string()))
        }
    }

    /// Stores a next-page session on the first call and resumes it on the next.
    struct Session {
        ctx: EngineContext,
    }

    impl SearchEngine for Session {
        fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
            let sessions = &self.ctx.services.sessions;
            match params.get("npt").and_then(|v| v.as_str()) {
                Some(token) => {
                    let (url, proxy) = sessions.get(token, "web");
                    Ok(json!({
                        "web": [],
                        "resumed_from": url,
                        "proxy": proxy.to_string(),
                    }))
                }
                None => {
                    let query = param_str(params, "s", "");
                    let url = format!("https://example.test/search?q={query}&page=2");
                    let token = sessions.store(&url, "web", &self.ctx.identity.proxy);
                    Ok(json!({ "web": [{ "title": query }], "npt": token }))
                }
            }
        }
    }

    /// Writes warnings and stray output before answering like echo.
    struct Noisy {
        ctx: EngineContext,
    }

    impl SearchEngine for Noisy {
        fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
            self.ctx.diagnostics.warn("Undefined index: related");
            let mut out = self.ctx.diagnostics.clone();
            writeln!(out, "<b>Notice</b>: stray output")?;
            write!(out, "unterminated")?;
            Ok(json!({ "web": [{ "title": param_str(params, "s", "") }] }))
        }
    }

    struct Panicking;

    impl SearchEngine for Panicking {
        fn web(&mut self, _params: &ParameterSet) -> EngineResult<SearchResult> {
            panic!("index out of bounds: the len is 0 but the index is 3")
        }
    }

    /// Sleeps for `sleep_ms` before answering.
    struct Slow;

    impl SearchEngine for Slow {
        fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
            let ms = params.get("sleep_ms").and_then(Value::as_u64).unwrap_or(0);
            std::thread::sleep(Duration::from_millis(ms));
            Ok(json!({ "web": [{ "title": "late" }] }))
        }
    }

    /// Returns a result whose single title is `bytes` long.
    struct Oversized;

    impl SearchEngine for Oversized {
        fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
            let bytes = params.get("bytes").and_then(Value::as_u64).unwrap_or(0);
            let title = "x".repeat(usize::try_from(bytes).unwrap_or(usize::MAX));
            Ok(json!({ "web": [{ "title": title }] }))
        }
    }
}
