//! Ambient services offered to engines: session store and proxy selection.

mod proxy;
mod session;

use std::sync::Arc;

use sidecar_sdk::services::AmbientServices;

pub use proxy::ProxySelector;
pub use session::{SessionRecord, StateStore};

/// Bundle the concrete services behind the SDK's trait objects.
pub fn ambient(sessions: Arc<StateStore>, proxies: Arc<ProxySelector>) -> AmbientServices {
    AmbientServices::new(sessions, proxies)
}
