//! Application-level configuration loading: broker sizing and stream timing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_MATCH_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Broadcast broker sizing and timeouts.
    pub broker: BrokerSettings,
    /// SSE stream timing.
    pub stream: StreamSettings,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
/// Queue sizes and timeouts of the broadcast broker.
pub struct BrokerSettings {
    /// Capacity of the broker's command intake.
    pub intake_capacity: usize,
    /// Capacity of each subscriber's delivery queue.
    pub subscriber_capacity: usize,
    /// How long a publisher waits for intake space before dropping the event.
    #[serde(rename = "publish_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub publish_timeout: Duration,
    /// How long the broker waits on one subscriber before skipping it.
    #[serde(rename = "delivery_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub delivery_timeout: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            intake_capacity: 100,
            subscriber_capacity: 10,
            publish_timeout: Duration::from_millis(100),
            delivery_timeout: Duration::from_secs(1),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
/// Timing of the stream-serving boundary.
pub struct StreamSettings {
    /// Interval between `heartbeat` events.
    #[serde(rename = "heartbeat_interval_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub heartbeat_interval: Duration,
    /// Interval between SSE comment keep-alives.
    #[serde(rename = "keep_alive_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub keep_alive: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            keep_alive: Duration::from_secs(15),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(path = %path.display(), "loaded configuration");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
