//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// User-Agent presented by engines unless `USER_AGENT` overrides it.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 8080).
    pub port: u16,

    /// Path to the engine manifest (default: ./manifest.json).
    pub manifest_path: PathBuf,

    /// Root directory engine load locations are resolved against (default: ./engines).
    pub engines_dir: PathBuf,

    /// Proxies from FOURGET_PROXIES (comma-separated, highest precedence).
    pub proxies: Vec<String>,

    /// Proxies from FALLBACK_PROXIES (comma-separated, used when `proxies` is empty).
    pub fallback_proxies: Vec<String>,

    /// User-Agent injected into every engine context.
    pub user_agent: String,

    /// Optional JSON file layered over the built-in default parameters.
    pub default_params_path: Option<PathBuf>,

    /// Wall-clock ceiling per contained call (default: 30s).
    pub dispatch_timeout: Duration,

    /// Largest serialized engine result accepted (default: 8 MiB).
    pub max_result_bytes: usize,

    /// Diagnostics kept per call before further output is dropped (default: 64 KiB).
    pub max_diagnostic_bytes: usize,

    /// Maximum contained calls running at once (default: 64).
    pub max_concurrent_dispatches: usize,

    /// Maximum contained calls one engine may hold at once (default: 16).
    pub max_concurrent_per_engine: usize,

    /// Lifetime of session-store records (default: 3600s).
    pub session_ttl: Duration,

    /// Maximum number of live session-store records (default: 100000).
    pub session_max_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            manifest_path: PathBuf::from("./manifest.json"),
            engines_dir: PathBuf::from("./engines"),
            proxies: Vec::new(),
            fallback_proxies: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_params_path: None,
            dispatch_timeout: Duration::from_secs(30),
            max_result_bytes: 8 * 1024 * 1024,
            max_diagnostic_bytes: 64 * 1024,
            max_concurrent_dispatches: 64,
            max_concurrent_per_engine: 16,
            session_ttl: Duration::from_secs(3600),
            session_max_capacity: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let manifest_path = env::var("MANIFEST_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./manifest.json"));

        let engines_dir = env::var("ENGINES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./engines"));

        let proxies = env::var("FOURGET_PROXIES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let fallback_proxies = env::var("FALLBACK_PROXIES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let user_agent = env::var("USER_AGENT")
            .ok()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let default_params_path = env::var("DEFAULT_PARAMS_PATH").ok().map(PathBuf::from);

        let dispatch_timeout_secs: u64 = env::var("DISPATCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("DISPATCH_TIMEOUT_SECS must be a valid u64")?;

        let max_result_bytes = env::var("MAX_RESULT_BYTES")
            .unwrap_or_else(|_| (8 * 1024 * 1024).to_string())
            .parse()
            .context("MAX_RESULT_BYTES must be a valid usize")?;

        let max_diagnostic_bytes = env::var("MAX_DIAGNOSTIC_BYTES")
            .unwrap_or_else(|_| (64 * 1024).to_string())
            .parse()
            .context("MAX_DIAGNOSTIC_BYTES must be a valid usize")?;

        let max_concurrent_dispatches: usize = env::var("MAX_CONCURRENT_DISPATCHES")
            .unwrap_or_else(|_| "64".to_string())
            .parse()
            .context("MAX_CONCURRENT_DISPATCHES must be a valid usize")?;

        let max_concurrent_per_engine: usize = env::var("MAX_CONCURRENT_PER_ENGINE")
            .unwrap_or_else(|_| "16".to_string())
            .parse()
            .context("MAX_CONCURRENT_PER_ENGINE must be a valid usize")?;

        let session_ttl_secs: u64 = env::var("SESSION_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .context("SESSION_TTL_SECS must be a valid u64")?;

        let session_max_capacity = env::var("SESSION_MAX_CAPACITY")
            .unwrap_or_else(|_| "100000".to_string())
            .parse()
            .context("SESSION_MAX_CAPACITY must be a valid u64")?;

        let config = Self {
            port,
            manifest_path,
            engines_dir,
            proxies,
            fallback_proxies,
            user_agent,
            default_params_path,
            dispatch_timeout: Duration::from_secs(dispatch_timeout_secs),
            max_result_bytes,
            max_diagnostic_bytes,
            max_concurrent_dispatches,
            max_concurrent_per_engine,
            session_ttl: Duration::from_secs(session_ttl_secs),
            session_max_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every dispatch fail.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch_timeout.is_zero() {
            bail!("DISPATCH_TIMEOUT_SECS must be at least 1");
        }
        if self.max_concurrent_dispatches == 0 {
            bail!("MAX_CONCURRENT_DISPATCHES must be at least 1");
        }
        if self.max_concurrent_per_engine == 0 {
            bail!("MAX_CONCURRENT_PER_ENGINE must be at least 1");
        }
        Ok(())
    }
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_skips_blanks() {
        assert_eq!(
            split_list(" 10.0.0.1:3128 ,, 10.0.0.2:3128:u:p ,"),
            vec!["10.0.0.1:3128", "10.0.0.2:3128:u:p"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn defaults_match_reference_ttl() {
        let config = Config::default();
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.port, 8080);
        assert!(config.proxies.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let zero_timeout = Config {
            dispatch_timeout: Duration::ZERO,
            ..Config::default()
        };
        let err = zero_timeout.validate().unwrap_err();
        assert!(err.to_string().contains("DISPATCH_TIMEOUT_SECS"));

        let zero_slots = Config {
            max_concurrent_dispatches: 0,
            ..Config::default()
        };
        assert!(zero_slots.validate().is_err());

        let zero_per_engine = Config {
            max_concurrent_per_engine: 0,
            ..Config::default()
        };
        assert!(zero_per_engine.validate().is_err());
    }
}
