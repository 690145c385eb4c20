//! Client configuration.

use std::time::Duration;

/// Default Authority endpoint.
pub const DEFAULT_AUTHORITY_URL: &str = "https://api.sigaid.com";

/// Default lease time-to-live.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(600);

/// Explicit configuration for an agent client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Authority base URL, no trailing slash.
    pub authority_url: String,

    /// API key sent as `X-API-Key`, if the deployment requires one.
    pub api_key: Option<String>,

    /// Requested lease TTL.
    pub lease_ttl: Duration,

    /// Renew at `acquired_at + ttl * renew_fraction`.
    pub renew_fraction: f64,

    /// Stop retrying renewal this long before expiry; past it the lease
    /// is reported lost.
    pub renew_safety_margin: Duration,

    /// Spawn the background renewal task while a lease is held.
    pub auto_renew: bool,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            api_key: None,
            lease_ttl: DEFAULT_LEASE_TTL,
            renew_fraction: 0.8,
            renew_safety_margin: Duration::from_secs(10),
            auto_renew: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build from the `SIGAID_*` environment, falling back to defaults:
    /// `SIGAID_AUTHORITY_URL`, `SIGAID_API_KEY`, `SIGAID_LEASE_TTL`
    /// (seconds), `SIGAID_AUTO_RENEW` (boolean).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SIGAID_AUTHORITY_URL") {
            config.authority_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(key) = std::env::var("SIGAID_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(ttl) = std::env::var("SIGAID_LEASE_TTL") {
            if let Ok(secs) = ttl.parse::<u64>() {
                config.lease_ttl = Duration::from_secs(secs);
            }
        }
        if let Ok(auto) = std::env::var("SIGAID_AUTO_RENEW") {
            config.auto_renew = matches!(auto.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Point at a specific Authority.
    pub fn with_authority_url(mut self, url: impl Into<String>) -> Self {
        self.authority_url = url.into();
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.authority_url, DEFAULT_AUTHORITY_URL);
        assert_eq!(config.lease_ttl, DEFAULT_LEASE_TTL);
        assert!((config.renew_fraction - 0.8).abs() < f64::EPSILON);
        assert!(config.auto_renew);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::default()
            .with_authority_url("http://localhost:9999")
            .with_lease_ttl(Duration::from_secs(30));
        assert_eq!(config.authority_url, "http://localhost:9999");
        assert_eq!(config.lease_ttl, Duration::from_secs(30));
    }
}
