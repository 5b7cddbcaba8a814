//! Echo engine.
//!
//! Returns the query as the title of a single result and offers one
//! `nsfw` filter. It makes no outbound calls, which makes it the engine of
//! choice for smoke-testing a deployment.

use serde_json::json;
use sidecar_sdk::prelude::*;

/// Entry-point name the engine registers under.
pub const ENTRY_POINT: &str = "echo";

/// Factory for the host's engine catalog.
pub fn factory() -> EngineFactory {
    sidecar_sdk::engine::factory(EchoEngine::new)
}

/// Engine that reflects `s` back to the caller.
#[derive(Debug)]
pub struct EchoEngine {
    engine_id: String,
}

impl EchoEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            engine_id: ctx.engine_id,
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }
}

impl SearchEngine for EchoEngine {
    fn filters(&self, _page: &str) -> EngineResult<FilterSpec> {
        Ok(json!({
            "nsfw": {
                "display": "NSFW",
                "option": {
                    "yes": "Yes",
                    "maybe": "Maybe",
                    "no": "No"
                }
            }
        }))
    }

    fn web(&mut self, params: &ParameterSet) -> EngineResult<SearchResult> {
        let query = param_str(params, "s", "");
        Ok(json!({ "web": [{ "title": query }] }))
    }
}
