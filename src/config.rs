//! Client configuration.
//!
//! Use the builder methods to customize, or [`DashwireConfig::from_env`] to
//! pick up overrides from the environment.
//!
//! ```ignore
//! use dashwire::config::DashwireConfig;
//!
//! let config = DashwireConfig::default()
//!     .with_api_base_url("http://localhost:9000")
//!     .with_max_reconnect_attempts(3);
//! ```

use std::time::Duration;

use crate::websocket::ReconnectPolicy;

/// Default API base URL when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Environment variable overriding the API base URL.
pub const ENV_API_URL: &str = "DASHWIRE_API_URL";

/// Environment variable overriding the reconnect attempt budget.
pub const ENV_MAX_RECONNECTS: &str = "DASHWIRE_MAX_RECONNECTS";

/// Configuration for both ingestion front-ends.
#[derive(Debug, Clone, PartialEq)]
pub struct DashwireConfig {
    /// Base URL of the backend HTTP API (no trailing slash)
    pub api_base_url: String,
    /// Path of the socket endpoint lookup (`{ enabled, url }`)
    pub ws_config_path: String,
    /// Path of the scenario stream endpoint
    pub stream_path: String,
    /// Reconnect attempts after an unexpected close before giving up
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnect attempt
    pub initial_backoff: Duration,
    /// Upper bound on the reconnect delay
    pub max_backoff: Duration,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for DashwireConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_config_path: "/api/ws/config".to_string(),
            stream_path: "/api/scenarios/stream".to_string(),
            max_reconnect_attempts: 5,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
            event_buffer: 100,
        }
    }
}

impl DashwireConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `DASHWIRE_API_URL` and `DASHWIRE_MAX_RECONNECTS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            config = config.with_api_base_url(url.trim());
        }

        if let Some(raw) = lookup(ENV_MAX_RECONNECTS) {
            match raw.trim().parse::<u32>() {
                Ok(n) => config.max_reconnect_attempts = n,
                Err(_) => {
                    tracing::warn!("Ignoring invalid {}={:?}", ENV_MAX_RECONNECTS, raw);
                }
            }
        }

        config
    }

    /// Set the API base URL. A trailing slash is dropped.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set the reconnect attempt budget.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set initial and maximum reconnect delays.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Full URL of the socket endpoint lookup.
    pub fn ws_config_url(&self) -> String {
        format!("{}{}", self.api_base_url, self.ws_config_path)
    }

    /// Full URL of the scenario stream endpoint.
    pub fn stream_url(&self) -> String {
        format!("{}{}", self.api_base_url, self.stream_path)
    }

    /// Reconnection policy derived from this config.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            initial_delay: self.initial_backoff,
            max_delay: self.max_backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DashwireConfig::default();
        assert_eq!(config.api_base_url, "http://127.0.0.1:8000");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.initial_backoff, Duration::from_millis(1000));
        assert_eq!(config.max_backoff, Duration::from_millis(30_000));
        assert_eq!(config.ws_config_url(), "http://127.0.0.1:8000/api/ws/config");
        assert_eq!(
            config.stream_url(),
            "http://127.0.0.1:8000/api/scenarios/stream"
        );
    }

    #[test]
    fn test_trailing_slash_dropped() {
        let config = DashwireConfig::new().with_api_base_url("http://host:1/");
        assert_eq!(config.stream_url(), "http://host:1/api/scenarios/stream");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://ops.internal:7000"),
            (ENV_MAX_RECONNECTS, "2"),
        ]
        .into_iter()
        .collect();

        let config = DashwireConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_base_url, "http://ops.internal:7000");
        assert_eq!(config.max_reconnect_attempts, 2);
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = DashwireConfig::from_lookup(|k| match k {
            ENV_MAX_RECONNECTS => Some("lots".to_string()),
            ENV_API_URL => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config, DashwireConfig::default());
    }

    #[test]
    fn test_reconnect_policy() {
        let policy = DashwireConfig::new()
            .with_max_reconnect_attempts(3)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(40))
            .reconnect_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(policy.max_delay, Duration::from_millis(40));
    }
}
