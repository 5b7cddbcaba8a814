//! Parser for the engine manifest.
//!
//! The manifest is a JSON object keyed by engine identifier:
//!
//! ```json
//! {
//!   "mojeek": { "file": "engines/mojeek.toml", "class": "mojeek" },
//!   "brave":  { "file": "engines/brave.toml",  "class": "brave" }
//! }
//! ```
//!
//! `file` is the engine's load location relative to the engines root and
//! `class` names the registered entry point that constructs it.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One engine declared by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Engine identifier, always `[a-z0-9_]+`.
    pub identifier: String,
    /// Artifact path relative to the engines root.
    pub load_location: PathBuf,
    /// Entry-point name looked up in the engine catalog.
    pub entry_point: String,
}

/// On-disk shape of a manifest value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    pub file: PathBuf,
    pub class: String,
}

/// Parsed, immutable manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Parse manifest JSON.
    ///
    /// Entries whose key is not a valid identifier are logged and skipped
    /// rather than failing the whole manifest.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawEntry> =
            serde_json::from_str(json).context("manifest is not a JSON object of {file, class}")?;

        let mut entries = BTreeMap::new();
        for (identifier, entry) in raw {
            if !is_valid_identifier(&identifier) {
                warn!(identifier = %identifier, "skipping manifest entry with invalid identifier");
                continue;
            }
            entries.insert(
                identifier.clone(),
                ManifestEntry {
                    identifier,
                    load_location: entry.file,
                    entry_point: entry.class,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Build a manifest directly from entries (used by tests and embedders).
    pub fn from_entries(entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|e| is_valid_identifier(&e.identifier))
                .map(|e| (e.identifier.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&ManifestEntry> {
        self.entries.get(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render back to the on-disk shape, for discovery responses.
    pub fn to_raw(&self) -> BTreeMap<String, RawEntry> {
        self.entries
            .values()
            .map(|e| {
                (
                    e.identifier.clone(),
                    RawEntry {
                        file: e.load_location.clone(),
                        class: e.entry_point.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Where the manifest comes from.
pub trait ManifestSource: Send + Sync {
    fn load(&self) -> Result<Manifest>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Manifest read from a JSON file.
#[derive(Debug, Clone)]
pub struct FileManifest {
    path: PathBuf,
}

impl FileManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ManifestSource for FileManifest {
    fn load(&self) -> Result<Manifest> {
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read manifest: {}", self.path.display()))?;
        Manifest::from_json(&json)
            .with_context(|| format!("failed to parse manifest: {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Manifest held in memory.
#[derive(Debug, Clone)]
pub struct StaticManifest(pub Manifest);

impl ManifestSource for StaticManifest {
    fn load(&self) -> Result<Manifest> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("<static manifest, {} entries>", self.0.len())
    }
}

/// Whether `s` is a non-empty `[a-z0-9_]+` identifier.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Join `relative` onto `root`, refusing anything that could escape it.
///
/// Absolute paths, `..` components and prefixes are rejected.
pub fn contained_path(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    let mut pushed = false;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    pushed.then_some(out)
}
