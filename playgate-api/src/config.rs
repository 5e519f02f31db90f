//! API Configuration Module
//!
//! Service settings loaded from `PLAYGATE_*` environment variables with
//! defaults for everything except the gate URL.

use std::net::SocketAddr;
use std::time::Duration;

use playgate_cache::{CacheConfig, FreshnessWindow, DEFAULT_FRESH_SECS, DEFAULT_STALE_SECS};
use playgate_core::ConfigError;
use reqwest::Url;

use crate::membership::Member;

/// Default upper bound on a token's remaining lifetime: 7 days.
pub const DEFAULT_MAX_TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Listener
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    // ========================================================================
    // Authorization
    // ========================================================================
    /// Gate endpoint. Required.
    pub gate_url: String,

    /// Bound on a single gate call.
    pub gate_timeout: Duration,

    /// Window used when the gate sends no usable `Cache-Control`.
    pub default_window: FreshnessWindow,

    /// Tokens expiring further out than this are rejected.
    pub max_token_lifetime: Duration,

    /// Entry count that triggers the cache size warning.
    pub cache_warn_entries: usize,

    // ========================================================================
    // Routing
    // ========================================================================
    /// Load balancer base URL.
    pub balancer_url: String,

    /// Bound on a single balancer probe.
    pub balancer_timeout: Duration,

    /// Namespace prefixes probed for every playback request.
    pub redirect_prefixes: Vec<String>,

    /// Prefix used for fallback redirects; the first redirect prefix if unset.
    pub fallback_prefix: Option<String>,

    /// Member tag holding the public playback address.
    pub playback_protocol: String,

    /// Initial cluster members.
    pub members: Vec<Member>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8090,
            gate_url: String::new(),
            gate_timeout: Duration::from_millis(5000),
            default_window: FreshnessWindow::new(DEFAULT_FRESH_SECS, DEFAULT_STALE_SECS),
            max_token_lifetime: Duration::from_secs(DEFAULT_MAX_TOKEN_LIFETIME_SECS),
            cache_warn_entries: 100_000,
            balancer_url: "http://127.0.0.1:8042".to_string(),
            balancer_timeout: Duration::from_millis(3000),
            redirect_prefixes: vec!["video".to_string()],
            fallback_prefix: None,
            playback_protocol: "https".to_string(),
            members: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables and validate it.
    ///
    /// Environment variables:
    /// - `PLAYGATE_API_BIND`: Listen host (default: 0.0.0.0)
    /// - `PORT` / `PLAYGATE_API_PORT`: Listen port (default: 8090)
    /// - `PLAYGATE_GATE_URL`: Gate endpoint (required)
    /// - `PLAYGATE_GATE_TIMEOUT_MS`: Gate call timeout (default: 5000)
    /// - `PLAYGATE_BALANCER_URL`: Balancer base URL (default: http://127.0.0.1:8042)
    /// - `PLAYGATE_BALANCER_TIMEOUT_MS`: Probe timeout (default: 3000)
    /// - `PLAYGATE_REDIRECT_PREFIXES`: Comma-separated prefixes (default: video)
    /// - `PLAYGATE_FALLBACK_PREFIX`: Fallback prefix (default: first prefix)
    /// - `PLAYGATE_PLAYBACK_PROTOCOL`: Member tag for redirects (default: https)
    /// - `PLAYGATE_DEFAULT_FRESH_SECS` / `PLAYGATE_DEFAULT_STALE_SECS` (default: 120 / 600)
    /// - `PLAYGATE_MAX_TOKEN_LIFETIME_SECS` (default: 604800)
    /// - `PLAYGATE_CACHE_WARN_ENTRIES` (default: 100000)
    /// - `PLAYGATE_MEMBERS`: JSON array of `{"name", "tags"}` (default: empty)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from an arbitrary variable source. Does not validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|s| s.trim().parse::<i64>().ok());

        let port = lookup("PORT")
            .or_else(|| lookup("PLAYGATE_API_PORT"))
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let redirect_prefixes = lookup("PLAYGATE_REDIRECT_PREFIXES")
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or(defaults.redirect_prefixes);

        let members = match lookup("PLAYGATE_MEMBERS") {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str::<Vec<Member>>(&raw).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "PLAYGATE_MEMBERS".to_string(),
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                })?
            }
            _ => Vec::new(),
        };

        Ok(Self {
            bind_host: lookup("PLAYGATE_API_BIND").unwrap_or(defaults.bind_host),
            port,
            gate_url: lookup("PLAYGATE_GATE_URL")
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            gate_timeout: parsed("PLAYGATE_GATE_TIMEOUT_MS")
                .and_then(|ms| u64::try_from(ms).ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.gate_timeout),
            default_window: FreshnessWindow::new(
                parsed("PLAYGATE_DEFAULT_FRESH_SECS").unwrap_or(defaults.default_window.fresh_secs),
                parsed("PLAYGATE_DEFAULT_STALE_SECS").unwrap_or(defaults.default_window.stale_secs),
            ),
            max_token_lifetime: parsed("PLAYGATE_MAX_TOKEN_LIFETIME_SECS")
                .and_then(|secs| u64::try_from(secs).ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_token_lifetime),
            cache_warn_entries: parsed("PLAYGATE_CACHE_WARN_ENTRIES")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.cache_warn_entries),
            balancer_url: lookup("PLAYGATE_BALANCER_URL")
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.balancer_url),
            balancer_timeout: parsed("PLAYGATE_BALANCER_TIMEOUT_MS")
                .and_then(|ms| u64::try_from(ms).ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.balancer_timeout),
            redirect_prefixes,
            fallback_prefix: lookup("PLAYGATE_FALLBACK_PREFIX")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            playback_protocol: lookup("PLAYGATE_PLAYBACK_PROTOCOL")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.playback_protocol),
            members,
        })
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gate_url.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "PLAYGATE_GATE_URL".to_string(),
            });
        }
        check_url("PLAYGATE_GATE_URL", &self.gate_url)?;
        check_url("PLAYGATE_BALANCER_URL", &self.balancer_url)?;

        if self.redirect_prefixes.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "PLAYGATE_REDIRECT_PREFIXES".to_string(),
                value: String::new(),
                reason: "at least one prefix is required".to_string(),
            });
        }

        for (field, timeout) in [
            ("PLAYGATE_GATE_TIMEOUT_MS", self.gate_timeout),
            ("PLAYGATE_BALANCER_TIMEOUT_MS", self.balancer_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                    reason: "timeout must be positive".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "PLAYGATE_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }

    /// Prefix used when routing to a fallback node.
    pub fn effective_fallback_prefix(&self) -> Option<&str> {
        self.fallback_prefix
            .as_deref()
            .or_else(|| self.redirect_prefixes.first().map(String::as_str))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_default_window(self.default_window)
            .with_entry_warn_threshold(self.cache_warn_entries)
    }
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
