//! Outbound identity: which proxy and User-Agent an engine presents.
//!
//! Proxies are configured as `host:port` or `host:port:user:pass`. The
//! literal `127.0.0.1` (or an empty string) means "connect directly".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire form of the direct-connection sentinel.
pub const DIRECT: &str = "127.0.0.1";

/// Error parsing a proxy string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxyParseError {
    #[error("proxy '{0}' must be host:port or host:port:user:pass")]
    Malformed(String),

    #[error("proxy '{proxy}' has invalid port '{port}'")]
    InvalidPort { proxy: String, port: String },
}

/// A selected outbound proxy, or a direct connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProxyIdentity {
    /// No proxy; the engine connects directly.
    #[default]
    Direct,
    /// An HTTP proxy, optionally with basic-auth credentials.
    Proxy {
        host: String,
        port: u16,
        credentials: Option<(String, String)>,
    },
}

impl ProxyIdentity {
    pub fn is_direct(&self) -> bool {
        matches!(self, ProxyIdentity::Direct)
    }

    /// Proxy URL suitable for an HTTP client, e.g. `http://10.0.0.1:3128`.
    pub fn url(&self) -> Option<String> {
        match self {
            ProxyIdentity::Direct => None,
            ProxyIdentity::Proxy { host, port, .. } => Some(format!("http://{host}:{port}")),
        }
    }

    /// Basic-auth credentials, if configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self {
            ProxyIdentity::Proxy {
                credentials: Some((user, pass)),
                ..
            } => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Build a `reqwest` proxy for this identity.
    ///
    /// Returns `Ok(None)` for direct connections so callers can skip
    /// configuring a proxy altogether.
    pub fn to_reqwest(&self) -> reqwest::Result<Option<reqwest::Proxy>> {
        let Some(url) = self.url() else {
            return Ok(None);
        };
        let mut proxy = reqwest::Proxy::all(url)?;
        if let Some((user, pass)) = self.credentials() {
            proxy = proxy.basic_auth(user, pass);
        }
        Ok(Some(proxy))
    }
}

impl FromStr for ProxyIdentity {
    type Err = ProxyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == DIRECT {
            return Ok(ProxyIdentity::Direct);
        }

        let parts: Vec<&str> = s.split(':').collect();
        let (host, port, credentials) = match parts.as_slice() {
            [host, port] => (*host, *port, None),
            [host, port, user, pass] => (
                *host,
                *port,
                Some(((*user).to_string(), (*pass).to_string())),
            ),
            _ => return Err(ProxyParseError::Malformed(s.to_string())),
        };

        if host.is_empty() {
            return Err(ProxyParseError::Malformed(s.to_string()));
        }

        let port = port.parse().map_err(|_| ProxyParseError::InvalidPort {
            proxy: s.to_string(),
            port: port.to_string(),
        })?;

        Ok(ProxyIdentity::Proxy {
            host: host.to_string(),
            port,
            credentials,
        })
    }
}

impl TryFrom<String> for ProxyIdentity {
    type Error = ProxyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProxyIdentity> for String {
    fn from(value: ProxyIdentity) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ProxyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyIdentity::Direct => f.write_str(DIRECT),
            ProxyIdentity::Proxy {
                host,
                port,
                credentials: None,
            } => write!(f, "{host}:{port}"),
            ProxyIdentity::Proxy {
                host,
                port,
                credentials: Some((user, pass)),
            } => write!(f, "{host}:{port}:{user}:{pass}"),
        }
    }
}

/// Immutable per-request outbound configuration injected into engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundIdentity {
    /// User-Agent header engines should send.
    pub user_agent: String,
    /// Proxy chosen for this request.
    pub proxy: ProxyIdentity,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let p: ProxyIdentity = "10.0.0.1:3128".parse().unwrap();
        assert_eq!(p.url().as_deref(), Some("http://10.0.0.1:3128"));
        assert!(p.credentials().is_none());
        assert_eq!(p.to_string(), "10.0.0.1:3128");
    }

    #[test]
    fn parses_credentials() {
        let p: ProxyIdentity = " proxy.example:8080:alice:s3cret ".parse().unwrap();
        assert_eq!(p.credentials(), Some(("alice", "s3cret")));
        assert_eq!(p.to_string(), "proxy.example:8080:alice:s3cret");
    }

    #[test]
    fn sentinel_and_empty_are_direct() {
        assert!("127.0.0.1".parse::<ProxyIdentity>().unwrap().is_direct());
        assert!("".parse::<ProxyIdentity>().unwrap().is_direct());
        assert_eq!(ProxyIdentity::Direct.to_string(), DIRECT);
        assert!(ProxyIdentity::Direct.url().is_none());
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            "host".parse::<ProxyIdentity>(),
            Err(ProxyParseError::Malformed(_))
        ));
        assert!(matches!(
            "host:1:user".parse::<ProxyIdentity>(),
            Err(ProxyParseError::Malformed(_))
        ));
        assert!(matches!(
            "host:notaport".parse::<ProxyIdentity>(),
            Err(ProxyParseError::InvalidPort { .. })
        ));
    }

    #[test]
    fn direct_builds_no_reqwest_proxy() {
        assert!(ProxyIdentity::Direct.to_reqwest().unwrap().is_none());
        let p: ProxyIdentity = "10.0.0.1:3128:u:p".parse().unwrap();
        assert!(p.to_reqwest().unwrap().is_some());
    }

    #[test]
    fn serde_uses_wire_form() {
        let p: ProxyIdentity = "10.0.0.1:3128".parse().unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"10.0.0.1:3128\"");
        let back: ProxyIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
