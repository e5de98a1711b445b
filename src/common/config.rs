//! Settings file handling
//!
//! Optional `config.toml` providing defaults for run parameters. Command line
//! flags and environment variables take precedence over these values.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Default conformance server
pub const DEFAULT_SERVER: &str = "https://www.certification.openid.net";

/// Main settings structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Run defaults
    #[serde(default)]
    pub defaults: Defaults,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Dashboard settings
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Default run settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// Conformance server base URL
    #[serde(default = "default_server")]
    pub server: String,

    /// Run the browser without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            server: default_server(),
            headless: default_headless(),
        }
    }
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_headless() -> bool {
    true
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Delay between status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,

    /// Maximum time a module may spend before reaching a terminal state
    #[serde(default = "default_module_timeout")]
    pub module_secs: f64,

    /// Timeout for a single HTTP request
    #[serde(default = "default_http_request")]
    pub http_request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            module_secs: default_module_timeout(),
            http_request_secs: default_http_request(),
        }
    }
}

fn default_poll_interval() -> f64 {
    5.0
}
fn default_module_timeout() -> f64 {
    240.0
}
fn default_http_request() -> u64 {
    30
}

/// Dashboard configuration
#[derive(Debug, Deserialize)]
pub struct DashboardConfig {
    /// Port the dashboard listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load settings from the default settings file
    ///
    /// Returns default settings if the file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timeout values that cannot become a `Duration`
    pub fn validate(&self) -> Result<()> {
        seconds("timeouts.poll_interval_secs", self.timeouts.poll_interval_secs)?;
        seconds("timeouts.module_secs", self.timeouts.module_secs)?;
        Ok(())
    }
}

/// Convert a user-supplied number of seconds
///
/// Zero, negative, non-finite and out-of-range values are rejected.
pub fn seconds(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::Config(format!(
            "{name} must be a positive number of seconds (got {value})"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("{name} is too large (got {value} seconds)")))
}
