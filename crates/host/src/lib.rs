//! Search-engine sidecar host.
//!
//! Resolves engine identifiers through a manifest, merges request
//! parameters over the default table, and runs each engine capability
//! inside an execution boundary that turns every failure into a JSON
//! error payload.

pub mod boundary;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod registry;
pub mod routes;
pub mod services;
pub mod state;

use registry::EngineCatalog;

/// Catalog of the engines compiled into this binary.
pub fn builtin_catalog() -> EngineCatalog {
    EngineCatalog::new().with(sidecar_echo::ENTRY_POINT, sidecar_echo::factory())
}
