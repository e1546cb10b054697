//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client can run against a local backend
//! with no configuration at all.

use std::time::Duration;

use rylie_net::{RetryPolicy, SupervisorConfig};
use rylie_shared::constants::{
    DEFAULT_API_URL, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_HISTORY_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS, DEFAULT_RETRY_JITTER,
    DEFAULT_RETRY_MAX_DELAY_MS,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    /// Env: `RYLIE_API_URL`
    /// Default: `http://localhost:8000`
    pub api_url: String,

    /// Base URL of the live channel endpoint.
    /// Env: `RYLIE_WS_URL`
    /// Default: `api_url` with `http` replaced by `ws` (`https` by `wss`).
    pub ws_url: String,

    /// Messages requested per history page.
    /// Env: `RYLIE_HISTORY_PAGE_SIZE`
    /// Default: `50`
    pub history_page_size: u32,

    /// Timeout for one REST call.
    /// Env: `RYLIE_REQUEST_TIMEOUT_SECS`
    /// Default: `30`
    pub request_timeout: Duration,

    /// Timeout for one live channel handshake.
    /// Env: `RYLIE_HANDSHAKE_TIMEOUT_SECS`
    /// Default: `10`
    pub handshake_timeout: Duration,

    /// Reconnect spacing.
    /// Env: `RYLIE_RETRY_POLICY` (`fixed` | `exponential`),
    /// `RYLIE_RETRY_DELAY_MS`, `RYLIE_RETRY_MAX_DELAY_MS`
    /// Default: exponential from 1s up to 30s.
    pub retry: RetryPolicy,

    /// Re-fetch the newest history page each time the live channel connects.
    /// Env: `RYLIE_RESYNC_ON_CONNECT` (true/false)
    /// Default: `true`
    pub resync_on_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: derive_ws_url(DEFAULT_API_URL),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            resync_on_connect: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("RYLIE_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().trim_end_matches('/').to_string();
        }

        config.ws_url = match lookup("RYLIE_WS_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => derive_ws_url(&config.api_url),
        };

        if let Some(val) = lookup("RYLIE_HISTORY_PAGE_SIZE") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.history_page_size = n,
                _ => tracing::warn!(value = %val, "Invalid RYLIE_HISTORY_PAGE_SIZE, using default"),
            }
        }

        if let Some(secs) = parse_secs(&lookup, "RYLIE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = secs;
        }

        if let Some(secs) = parse_secs(&lookup, "RYLIE_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout = secs;
        }

        let delay = parse_millis(&lookup, "RYLIE_RETRY_DELAY_MS")
            .unwrap_or(Duration::from_millis(DEFAULT_RETRY_DELAY_MS));
        let max = parse_millis(&lookup, "RYLIE_RETRY_MAX_DELAY_MS")
            .unwrap_or(Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS))
            .max(delay);

        config.retry = match lookup("RYLIE_RETRY_POLICY").as_deref().map(str::trim) {
            None | Some("exponential") => RetryPolicy::Exponential {
                base: delay,
                max,
                jitter: DEFAULT_RETRY_JITTER,
            },
            Some("fixed") => RetryPolicy::fixed(delay),
            Some(other) => {
                tracing::warn!(value = %other, "Invalid RYLIE_RETRY_POLICY, using exponential");
                RetryPolicy::Exponential {
                    base: delay,
                    max,
                    jitter: DEFAULT_RETRY_JITTER,
                }
            }
        };

        if let Some(val) = lookup("RYLIE_RESYNC_ON_CONNECT") {
            config.resync_on_connect = val != "false" && val != "0";
        }

        config
    }

    /// Settings handed to the connection supervisor.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            handshake_timeout: self.handshake_timeout,
            retry: self.retry.clone(),
        }
    }
}

/// `http://host` -> `ws://host`, `https://host` -> `wss://host`.
pub fn derive_ws_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let val = lookup(key)?;
    match val.parse::<u64>() {
        Ok(n) if n > 0 => Some(Duration::from_secs(n)),
        _ => {
            tracing::warn!(key, value = %val, "Invalid duration, using default");
            None
        }
    }
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let val = lookup(key)?;
    match val.parse::<u64>() {
        Ok(n) if n > 0 => Some(Duration::from_millis(n)),
        _ => {
            tracing::warn!(key, value = %val, "Invalid duration, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.ws_url, "ws://localhost:8000");
        assert_eq!(config.history_page_size, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert!(config.resync_on_connect);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_ws_url_follows_api_scheme() {
        assert_eq!(derive_ws_url("https://api.example.com"), "wss://api.example.com");
        assert_eq!(derive_ws_url("http://127.0.0.1:9000"), "ws://127.0.0.1:9000");

        let config = ClientConfig::from_lookup(lookup_from(&[(
            "RYLIE_API_URL",
            "https://api.example.com/",
        )]));
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.ws_url, "wss://api.example.com");
    }

    #[test]
    fn test_explicit_values() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("RYLIE_WS_URL", "wss://push.example.com"),
            ("RYLIE_HISTORY_PAGE_SIZE", "20"),
            ("RYLIE_HANDSHAKE_TIMEOUT_SECS", "3"),
            ("RYLIE_RETRY_POLICY", "fixed"),
            ("RYLIE_RETRY_DELAY_MS", "2000"),
            ("RYLIE_RESYNC_ON_CONNECT", "false"),
        ]));
        assert_eq!(config.ws_url, "wss://push.example.com");
        assert_eq!(config.history_page_size, 20);
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.retry, RetryPolicy::fixed(Duration::from_secs(2)));
        assert!(!config.resync_on_connect);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("RYLIE_HISTORY_PAGE_SIZE", "0"),
            ("RYLIE_REQUEST_TIMEOUT_SECS", "soon"),
            ("RYLIE_RETRY_POLICY", "linear"),
        ]));
        assert_eq!(config.history_page_size, 50);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
