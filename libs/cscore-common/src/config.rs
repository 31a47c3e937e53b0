// Process-wide execution configuration
// Read once at startup from the environment, never mutated afterwards

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_REMOTE_URL: &str = "https://judge0-ce.p.rapidapi.com";
pub const DEFAULT_API_KEY_HEADER: &str = "X-RapidAPI-Key";
/// Lowercase so it can be used as a static header name
pub const HOST_HEADER: &str = "x-rapidapi-host";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Local,
    Remote,
    Hybrid,
}

impl Strategy {
    /// Unknown values resolve as hybrid, the documented default
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "local" => Strategy::Local,
            "remote" => Strategy::Remote,
            _ => Strategy::Hybrid,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Local => "local",
            Strategy::Remote => "remote",
            Strategy::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStrategyConfig {
    pub strategy: Strategy,
    pub remote_enabled: bool,
}

impl Default for ExecutionStrategyConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Hybrid,
            remote_enabled: false,
        }
    }
}

impl ExecutionStrategyConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            strategy: lookup("EXECUTION_STRATEGY")
                .map(|s| Strategy::parse(&s))
                .unwrap_or(Strategy::Hybrid),
            remote_enabled: lookup("REMOTE_SERVER_ENABLED")
                .map(|s| parse_bool(&s))
                .unwrap_or(false),
        }
    }
}

/// Connection settings for the remote judge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJudgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub host: Option<String>,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for RemoteJudgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REMOTE_URL.to_string(),
            api_key: None,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            host: None,
            poll_attempts: 10,
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_millis(2000),
        }
    }
}

impl RemoteJudgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            base_url: non_empty("REMOTE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            api_key: non_empty("REMOTE_API_KEY"),
            api_key_header: non_empty("REMOTE_API_KEY_HEADER").unwrap_or(defaults.api_key_header),
            host: non_empty("REMOTE_HOST"),
            poll_attempts: parse_or(non_empty("REMOTE_POLL_ATTEMPTS"), defaults.poll_attempts),
            poll_interval: non_empty("REMOTE_POLL_INTERVAL_MS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            request_timeout: non_empty("REMOTE_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            probe_timeout: non_empty("REMOTE_PROBE_TIMEOUT_MS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_timeout),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>, host: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self.host = Some(host.into());
        self
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_strategy_defaults_to_hybrid() {
        let config = ExecutionStrategyConfig::from_lookup(lookup(&[]));
        assert_eq!(config.strategy, Strategy::Hybrid);
        assert!(!config.remote_enabled);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(Strategy::parse("LOCAL"), Strategy::Local);
        assert_eq!(Strategy::parse(" remote "), Strategy::Remote);
        assert_eq!(Strategy::parse("jobe"), Strategy::Hybrid);
    }

    #[test]
    fn test_strategy_config_from_env_values() {
        let config = ExecutionStrategyConfig::from_lookup(lookup(&[
            ("EXECUTION_STRATEGY", "remote"),
            ("REMOTE_SERVER_ENABLED", "TRUE"),
        ]));
        assert_eq!(config.strategy, Strategy::Remote);
        assert!(config.remote_enabled);
    }

    #[test]
    fn test_remote_config_defaults() {
        let config = RemoteJudgeConfig::from_lookup(lookup(&[]));
        assert_eq!(config.base_url, DEFAULT_REMOTE_URL);
        assert_eq!(config.poll_attempts, 10);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_remote_config_overrides() {
        let config = RemoteJudgeConfig::from_lookup(lookup(&[
            ("REMOTE_URL", "http://judge.local:2358/"),
            ("REMOTE_API_KEY", "secret"),
            ("REMOTE_HOST", "judge.local"),
            ("REMOTE_POLL_ATTEMPTS", "3"),
            ("REMOTE_POLL_INTERVAL_MS", "20"),
            ("REMOTE_PROBE_TIMEOUT_MS", "not-a-number"),
        ]));
        assert_eq!(config.base_url, "http://judge.local:2358");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.host.as_deref(), Some("judge.local"));
        assert_eq!(config.poll_attempts, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.probe_timeout, Duration::from_millis(2000));
    }
}
