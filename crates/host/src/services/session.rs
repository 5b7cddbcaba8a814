//! Ephemeral session store.
//!
//! Records live in an in-process Moka cache with a fixed time-to-live.
//! Expiry is checked on read, so a stale record is never returned; the
//! capacity bound keeps memory in check between evictions. At capacity the
//! least recently used record is evicted, so a freshly stored token is
//! always admitted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use rand::RngCore;
use rand::rngs::OsRng;
use sidecar_sdk::identity::ProxyIdentity;
use sidecar_sdk::services::SessionStore;
use tracing::debug;

/// Token entropy in bytes (128 bits).
const TOKEN_BYTES: usize = 16;

/// A stored scrape session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Page the session continues from.
    pub target_url: String,
    /// Kind the record was stored under (e.g. "web", "images").
    pub kind: String,
    /// Proxy the session was established through.
    pub proxy: ProxyIdentity,
    /// Cookies collected so far.
    pub cookies: HashMap<String, String>,
}

/// TTL-bounded token → session store shared by all requests.
#[derive(Clone)]
pub struct StateStore {
    records: Cache<String, Arc<SessionRecord>>,
    ttl: Duration,
}

impl StateStore {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let records = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_live(ttl)
            .build();
        Self { records, ttl }
    }

    /// Fetch the full record behind a token, if still live.
    pub fn record(&self, token: &str) -> Option<Arc<SessionRecord>> {
        self.records.get(token)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of records as of the last maintenance pass.
    ///
    /// Does no cache maintenance, so it is cheap to call from async code.
    pub fn entry_count(&self) -> u64 {
        self.records.entry_count()
    }

    /// Number of live records, after running pending maintenance.
    pub fn len(&self) -> u64 {
        self.records.run_pending_tasks();
        self.records.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for StateStore {
    fn store(&self, url: &str, kind: &str, proxy: &ProxyIdentity) -> String {
        let token = generate_token();
        let record = SessionRecord {
            target_url: url.to_string(),
            kind: kind.to_string(),
            proxy: proxy.clone(),
            cookies: HashMap::new(),
        };
        self.records.insert(token.clone(), Arc::new(record));
        debug!(kind = %kind, ttl_secs = self.ttl.as_secs(), "session stored");
        token
    }

    fn get(&self, token: &str, _kind: &str) -> (Option<String>, ProxyIdentity) {
        match self.records.get(token) {
            Some(record) => (Some(record.target_url.clone()), record.proxy.clone()),
            None => (None, ProxyIdentity::Direct),
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("ttl", &self.ttl)
            .field("entries", &self.records.entry_count())
            .finish()
    }
}

/// Fresh unguessable token: 128 bits from the OS RNG, hex-encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
