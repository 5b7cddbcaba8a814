//! Engine registry for the sidecar.
//!
//! This module handles:
//! - Parsing the engine manifest (identifier → load location + entry point)
//! - Holding the catalog of compiled-in engine factories
//! - Resolving identifiers to constructible engines, with the manifest cached
//!   for the life of the process

mod catalog;
mod engines;
mod manifest;

pub use catalog::EngineCatalog;
pub use engines::{EngineRegistry, ResolvedEngine};
pub use manifest::{
    FileManifest, Manifest, ManifestEntry, ManifestSource, RawEntry, StaticManifest,
    contained_path, is_valid_identifier,
};
