//! Outbound-identity selection.
//!
//! Proxies are picked uniformly at random from the environment-provided
//! list, else from the fallback list, else the engine connects directly.

use rand::seq::SliceRandom;
use sidecar_sdk::identity::{OutboundIdentity, ProxyIdentity};
use sidecar_sdk::services::ProxySource;
use tracing::warn;

use crate::config::Config;

/// Stateless proxy and User-Agent picker.
#[derive(Debug, Clone)]
pub struct ProxySelector {
    primary: Vec<ProxyIdentity>,
    fallback: Vec<ProxyIdentity>,
    user_agent: String,
}

impl ProxySelector {
    /// Build a selector, skipping (and logging) entries that do not parse.
    pub fn new(primary: &[String], fallback: &[String], user_agent: impl Into<String>) -> Self {
        Self {
            primary: parse_list(primary, "FOURGET_PROXIES"),
            fallback: parse_list(fallback, "FALLBACK_PROXIES"),
            user_agent: user_agent.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.proxies,
            &config.fallback_proxies,
            config.user_agent.clone(),
        )
    }

    /// Pick a proxy by precedence: primary list, fallback list, direct.
    pub fn select(&self) -> ProxyIdentity {
        let mut rng = rand::thread_rng();
        self.primary
            .choose(&mut rng)
            .or_else(|| self.fallback.choose(&mut rng))
            .cloned()
            .unwrap_or(ProxyIdentity::Direct)
    }

    /// Identity to inject into an engine for one request.
    pub fn identity(&self) -> OutboundIdentity {
        OutboundIdentity {
            user_agent: self.user_agent.clone(),
            proxy: self.select(),
        }
    }

    /// Number of usable proxies across both lists.
    pub fn proxy_count(&self) -> usize {
        self.primary.len() + self.fallback.len()
    }
}

impl ProxySource for ProxySelector {
    fn select_proxy(&self) -> ProxyIdentity {
        self.select()
    }
}

fn parse_list(entries: &[String], origin: &str) -> Vec<ProxyIdentity> {
    entries
        .iter()
        .filter_map(|raw| match raw.parse::<ProxyIdentity>() {
            Ok(ProxyIdentity::Direct) => None,
            Ok(proxy) => Some(proxy),
            Err(e) => {
                warn!(origin = %origin, error = %e, "ignoring unparseable proxy");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn primary_list_takes_precedence() {
        let selector = ProxySelector::new(
            &strings(&["10.0.0.1:3128", "10.0.0.2:3128:u:p"]),
            &strings(&["192.168.1.1:8080"]),
            "ua",
        );
        let allowed: HashSet<String> = strings(&["10.0.0.1:3128", "10.0.0.2:3128:u:p"])
            .into_iter()
            .collect();

        for _ in 0..50 {
            assert!(allowed.contains(&selector.select().to_string()));
        }
    }

    #[test]
    fn fallback_used_when_primary_empty() {
        let selector = ProxySelector::new(&[], &strings(&["192.168.1.1:8080"]), "ua");
        assert_eq!(selector.select().to_string(), "192.168.1.1:8080");
    }

    #[test]
    fn direct_when_nothing_configured() {
        let selector = ProxySelector::new(&[], &[], "ua");
        assert!(selector.select().is_direct());
        assert_eq!(selector.identity().proxy.to_string(), "127.0.0.1");
    }

    #[test]
    fn selection_reaches_every_entry() {
        let list = strings(&["a:1", "b:2", "c:3"]);
        let selector = ProxySelector::new(&list, &[], "ua");
        let seen: HashSet<String> = (0..300).map(|_| selector.select().to_string()).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let selector = ProxySelector::new(
            &strings(&["not-a-proxy", "host:badport", "127.0.0.1"]),
            &strings(&["192.168.1.1:8080"]),
            "ua",
        );
        assert_eq!(selector.proxy_count(), 1);
        assert_eq!(selector.select().to_string(), "192.168.1.1:8080");
    }

    #[test]
    fn identity_carries_user_agent() {
        let selector = ProxySelector::new(&[], &[], "Mozilla/5.0 test");
        assert_eq!(selector.identity().user_agent, "Mozilla/5.0 test");
    }
}
