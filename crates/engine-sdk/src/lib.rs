//! Sidecar Engine SDK
//!
//! Types and traits shared between the sidecar host and the search engines
//! it runs. Engines implement [`SearchEngine`](engine::SearchEngine) and are
//! registered with the host under an entry-point name; the host constructs a
//! fresh instance per request and hands it an [`EngineContext`](engine::EngineContext)
//! carrying everything the engine may touch.

pub mod diagnostics;
pub mod engine;
pub mod identity;
pub mod services;
pub mod types;

// Re-export serde_json so engines can build results without a direct dependency.
#[doc(hidden)]
pub use serde_json;

pub mod prelude {
    pub use crate::diagnostics::Diagnostics;
    pub use crate::engine::{
        EngineContext, EngineError, EngineFactory, EngineResult, SearchEngine, factory,
    };
    pub use crate::identity::{OutboundIdentity, ProxyIdentity};
    pub use crate::services::{AmbientServices, ProxySource, SessionStore, detect_block_page};
    pub use crate::types::*;
}
