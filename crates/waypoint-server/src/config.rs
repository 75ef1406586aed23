//! Daemon configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (WAYPOINT_*)
//! - TOML configuration file

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the producer-facing TCP protocol listens on.
    #[serde(default = "default_tcp_address")]
    pub tcp_address: String,

    /// Address the HTTP query/admin API listens on.
    #[serde(default = "default_http_address")]
    pub http_address: String,

    /// Address this lookup instance advertises to producers in the IDENTIFY
    /// response.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,

    /// Producers without a heartbeat for this long are dropped from lookup
    /// responses.
    #[serde(default = "default_inactive_producer_timeout")]
    pub inactive_producer_timeout_ms: u64,

    /// How long a tombstone hides a producer from `/lookup`.
    #[serde(default = "default_tombstone_lifetime")]
    pub tombstone_lifetime_ms: u64,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Exporter port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_tcp_address() -> String {
    std::env::var("WAYPOINT_TCP_ADDRESS").unwrap_or_else(|_| "0.0.0.0:4160".to_string())
}

fn default_http_address() -> String {
    std::env::var("WAYPOINT_HTTP_ADDRESS").unwrap_or_else(|_| "0.0.0.0:4161".to_string())
}

fn default_broadcast_address() -> String {
    std::env::var("WAYPOINT_BROADCAST_ADDRESS").unwrap_or_else(|_| {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string())
    })
}

fn default_inactive_producer_timeout() -> u64 {
    300_000 // 5 minutes
}

fn default_tombstone_lifetime() -> u64 {
    45_000 // 45 seconds
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9190
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tcp_address: default_tcp_address(),
            http_address: default_http_address(),
            broadcast_address: default_broadcast_address(),
            inactive_producer_timeout_ms: default_inactive_producer_timeout(),
            tombstone_lifetime_ms: default_tombstone_lifetime(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "waypoint.toml",
            "/etc/waypoint/waypoint.toml",
            "~/.config/waypoint/waypoint.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// The inactivity window for producer liveness.
    #[must_use]
    pub fn inactive_producer_timeout(&self) -> Duration {
        Duration::from_millis(self.inactive_producer_timeout_ms)
    }

    /// The tombstone lifetime.
    #[must_use]
    pub fn tombstone_lifetime(&self) -> Duration {
        Duration::from_millis(self.tombstone_lifetime_ms)
    }
}
