//! Configuration management
//!
//! Handles loading and validating channel configuration from TOML files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::connection::RetryPolicy;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Notification server target
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Explicit WebSocket URL; derived from `host` when absent
    pub url: Option<String>,
    /// Server host (host:port)
    #[serde(default = "default_host")]
    pub host: String,
    /// Use `wss` instead of `ws` for the derived URL
    #[serde(default)]
    pub secure: bool,
    /// Endpoint path for the derived URL
    #[serde(default = "default_path")]
    pub path: String,
}

impl ServerConfig {
    /// Get the URL the channel connects to
    pub fn endpoint(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => derive_url(&self.host, self.secure, &self.path),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            secure: false,
            path: default_path(),
        }
    }
}

/// Automatic reconnect configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Attempts allowed after a close before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Whether a close requested via `disconnect()` still feeds the retry policy
    #[serde(default = "default_true")]
    pub retry_after_disconnect: bool,
}

impl ReconnectConfig {
    /// Build the retry policy described by this section
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.interval_ms))
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
            retry_after_disconnect: default_true(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Build `ws(s)://<host><path>`
pub fn derive_url(host: &str, secure: bool, path: &str) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    let path = path.trim_start_matches('/');
    format!("{}://{}/{}", scheme, host.trim_end_matches('/'), path)
}

/// Check that `raw` is an absolute ws/wss URL
pub fn validate_url(raw: &str) -> crate::Result<url::Url> {
    let parsed = url::Url::parse(raw).map_err(|e| crate::Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(crate::Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

// Default value functions
fn default_host() -> String {
    "localhost:8080".to_string()
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.url.is_none() && self.server.host.is_empty() {
            anyhow::bail!("server.host must not be empty when server.url is unset");
        }
        validate_url(&self.server.endpoint())
            .with_context(|| "server endpoint is not a valid WebSocket URL")?;
        if self.reconnect.interval_ms == 0 {
            anyhow::bail!("reconnect.interval_ms must be > 0");
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => anyhow::bail!("logging.format must be 'json' or 'pretty', got '{}'", other),
        }
        Ok(())
    }
}
