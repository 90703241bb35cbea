//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so the binary runs with no configuration
//! against the public JSONBin API.

use std::path::PathBuf;
use std::time::Duration;

use nestlog_shared::constants::{
    DEFAULT_ALERT_INTERVAL_SECS, DEFAULT_API_BASE, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_SYNC_INTERVAL_SECS,
};
use nestlog_sync::{JsonBinConfig, SchedulerConfig};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the document store.
    /// Env: `NESTLOG_API_BASE`
    pub api_base: String,

    /// Access key sent with every request. When unset, the key saved in the
    /// local database is used instead.
    /// Env: `NESTLOG_API_KEY`
    pub api_key: Option<String>,

    /// SQLite file. `None` means the platform data directory.
    /// Env: `NESTLOG_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Env: `NESTLOG_SYNC_INTERVAL_SECS`
    pub sync_interval: Duration,

    /// Env: `NESTLOG_ALERT_INTERVAL_SECS`
    pub alert_interval: Duration,

    /// Env: `NESTLOG_HTTP_TIMEOUT_SECS`
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            db_path: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            alert_interval: Duration::from_secs(DEFAULT_ALERT_INTERVAL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("NESTLOG_API_BASE") {
            if !base.trim().is_empty() {
                config.api_base = base.trim().to_string();
            }
        }

        if let Ok(key) = std::env::var("NESTLOG_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = Some(key.trim().to_string());
            }
        }

        if let Ok(path) = std::env::var("NESTLOG_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        read_secs("NESTLOG_SYNC_INTERVAL_SECS", &mut config.sync_interval);
        read_secs("NESTLOG_ALERT_INTERVAL_SECS", &mut config.alert_interval);
        read_secs("NESTLOG_HTTP_TIMEOUT_SECS", &mut config.http_timeout);

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    /// HTTP client settings. The environment key wins over `stored_key`.
    pub fn jsonbin(&self, stored_key: Option<String>) -> JsonBinConfig {
        JsonBinConfig {
            base_url: self.api_base.clone(),
            api_key: self.api_key.clone().or(stored_key),
            timeout: self.http_timeout,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.sync_interval,
        }
    }
}

fn read_secs(var: &str, target: &mut Duration) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match parse_secs(&raw) {
        Some(duration) => *target = duration,
        None => {
            tracing::warn!(var, value = %raw, "Invalid duration, using default");
        }
    }
}

/// Whole seconds, at least one.
fn parse_secs(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => None,
    }
}
