//! Ambient services engines may call during a request.
//!
//! The host provides the implementations; engines only see these traits.

use std::fmt;
use std::sync::Arc;

use crate::identity::ProxyIdentity;

/// Short-lived keyed state shared between requests.
///
/// Engines use this to carry a scrape session (target URL and the proxy it
/// was fetched through) from one page to the next behind an opaque token.
pub trait SessionStore: Send + Sync {
    /// Persist a record and return a fresh unguessable token for it.
    fn store(&self, url: &str, kind: &str, proxy: &ProxyIdentity) -> String;

    /// Look up a record.
    ///
    /// Unknown or expired tokens yield `(None, ProxyIdentity::Direct)`.
    fn get(&self, token: &str, kind: &str) -> (Option<String>, ProxyIdentity);
}

/// Picks the proxy an engine should use for its next outbound call.
pub trait ProxySource: Send + Sync {
    fn select_proxy(&self) -> ProxyIdentity;
}

/// Handles to the ambient services, cheap to clone into each engine.
#[derive(Clone)]
pub struct AmbientServices {
    pub sessions: Arc<dyn SessionStore>,
    pub proxies: Arc<dyn ProxySource>,
}

impl AmbientServices {
    pub fn new(sessions: Arc<dyn SessionStore>, proxies: Arc<dyn ProxySource>) -> Self {
        Self { sessions, proxies }
    }
}

impl fmt::Debug for AmbientServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientServices")
            .field("sessions", &"SessionStore")
            .field("proxies", &"ProxySource")
            .finish()
    }
}

/// Markers that identify a rate-limit or captcha interstitial.
const BLOCK_MARKERS: &[&str] = &["captcha", "unusual traffic", "429 too many requests"];

/// Whether a fetched page looks like an anti-bot block page.
pub fn detect_block_page(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCK_MARKERS.iter().any(|m| lower.contains(m))
}
