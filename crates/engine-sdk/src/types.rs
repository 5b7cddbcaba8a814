//! Core types exchanged between the host and engines.
//!
//! Everything crossing the capability boundary is plain JSON so the host can
//! return engine output verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Merged request parameters handed to [`SearchEngine::web`](crate::engine::SearchEngine::web).
///
/// Values are JSON scalars (string, number, boolean or null).
pub type ParameterSet = serde_json::Map<String, serde_json::Value>;

/// Filter specification returned by the `filters` capability.
///
/// Usually an object keyed by filter name, each with a `display` label and an
/// `option` map of value to label.
pub type FilterSpec = serde_json::Value;

/// Search result returned by the `web` capability.
///
/// Commonly an object with a `web` array of `{title, url, description}`
/// entries, plus optional `npt` (next-page token), `spelling`, `image` and
/// `related` sections.
pub type SearchResult = serde_json::Value;

/// A capability an engine may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Describe the filters the engine understands for a page.
    Filters,
    /// Run a web search.
    Web,
}

impl Capability {
    /// Machine name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Filters => "filters",
            Capability::Web => "web",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read a string parameter, falling back to `default` when absent or not a string.
pub fn param_str<'a>(params: &'a ParameterSet, key: &str, default: &'a str) -> &'a str {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

/// Read a boolean-ish parameter.
///
/// Accepts JSON booleans as well as the `"yes"`/`"no"` strings most engines use.
pub fn param_flag(params: &ParameterSet, key: &str) -> bool {
    match params.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => matches!(s.as_str(), "yes" | "true" | "1"),
        Some(serde_json::Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}
