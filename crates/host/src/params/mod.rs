//! Parameter resolution: request parameters merged over engine defaults.
//!
//! The default table is data, not code. It ships as `defaults.json` and an
//! operator may layer another JSON object over it without touching dispatch.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use sidecar_sdk::types::ParameterSet;

use crate::error::{DispatchError, DispatchResult};

/// Built-in defaults every engine can rely on.
const BUILTIN_DEFAULTS: &str = include_str!("defaults.json");

/// The default parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultParams {
    values: ParameterSet,
}

impl DefaultParams {
    /// The built-in table.
    pub fn builtin() -> Result<Self> {
        let values = parse_object(BUILTIN_DEFAULTS).context("built-in defaults.json is invalid")?;
        Ok(Self { values })
    }

    /// Built-in table, with `overlay` (if any) merged over it.
    pub fn load(overlay: Option<&Path>) -> Result<Self> {
        let defaults = Self::builtin()?;
        match overlay {
            Some(path) => defaults.with_overlay_file(path),
            None => Ok(defaults),
        }
    }

    /// Merge the JSON object in `path` over this table.
    pub fn with_overlay_file(self, path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read default params: {}", path.display()))?;
        let overlay = parse_object(&json)
            .with_context(|| format!("failed to parse default params: {}", path.display()))?;
        Ok(self.with_overlay(&overlay))
    }

    /// Merge `overlay` over this table using the request precedence rule.
    pub fn with_overlay(self, overlay: &ParameterSet) -> Self {
        Self {
            values: merge(overlay, &self.values),
        }
    }

    pub fn as_map(&self) -> &ParameterSet {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Resolve a request's parameters against this table.
    pub fn resolve(&self, request: &ParameterSet) -> ParameterSet {
        merge(request, &self.values)
    }
}

/// Right-biased union: defaults as the base, request keys override.
///
/// `merge(p, d)[k]` is `p[k]` when `k` is in `p`, else `d[k]` when `k` is
/// in `d`, else absent.
pub fn merge(request: &ParameterSet, defaults: &ParameterSet) -> ParameterSet {
    let mut merged = defaults.clone();
    for (key, value) in request {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Reject parameter values that are not JSON scalars.
pub fn validate_scalars(params: &ParameterSet) -> DispatchResult<()> {
    match params
        .iter()
        .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        Some((key, _)) => Err(DispatchError::InvalidRequest(format!(
            "parameter '{key}' must be a string, number, boolean or null"
        ))),
        None => Ok(()),
    }
}

fn parse_object(json: &str) -> Result<ParameterSet> {
    let Value::Object(values) = serde_json::from_str(json)? else {
        bail!("expected a JSON object");
    };
    validate_scalars(&values).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(values)
}
