use std::time::Duration;

/// Reference interval between status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Tracker configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local backend.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base HTTP API URL, e.g. `http://localhost:8000/api`.
    pub api_url: String,
    /// Base WebSocket URL, e.g. `ws://localhost:8000`.
    pub ws_url: String,
    /// Delay between two status polls.
    pub poll_interval: Duration,
    /// When `false` the tracker relies on polling alone.
    pub push_enabled: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".into(),
            ws_url: "ws://localhost:8000".into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            push_enabled: true,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                     |
    /// |----------------------------|-----------------------------|
    /// | `BIZEVAL_API_URL`          | `http://localhost:8000/api` |
    /// | `BIZEVAL_WS_URL`           | `ws://localhost:8000`       |
    /// | `BIZEVAL_POLL_INTERVAL_MS` | `2000`                      |
    /// | `BIZEVAL_PUSH_ENABLED`     | `true`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = lookup("BIZEVAL_API_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let ws_url = lookup("BIZEVAL_WS_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.ws_url);

        let poll_interval = match lookup("BIZEVAL_POLL_INTERVAL_MS") {
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "BIZEVAL_POLL_INTERVAL_MS",
                    value: raw.clone(),
                })?;
                if ms == 0 {
                    return Err(ConfigError::Invalid {
                        key: "BIZEVAL_POLL_INTERVAL_MS",
                        value: raw,
                    });
                }
                Duration::from_millis(ms)
            }
            None => defaults.poll_interval,
        };

        let push_enabled = match lookup("BIZEVAL_PUSH_ENABLED") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "BIZEVAL_PUSH_ENABLED",
                        value: raw,
                    })
                }
            },
            None => defaults.push_enabled,
        };

        Ok(Self {
            api_url,
            ws_url,
            poll_interval,
            push_enabled,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}
