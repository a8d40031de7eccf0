//! WX Report Configuration
//!
//! TOML-based configuration with environment variable override support.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use wx_common::RequestOptions;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dispatch: DispatchConfig,
    pub report: ReportConfig,
    pub simulator: SimulatorConfig,
}

/// Channel pool and request dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of channels opened at startup
    pub pool_size: usize,
    /// Sleep between full passes over the pool when every channel is at capacity
    pub backoff_ms: u64,
    /// Cap on full passes per location. Unset means retry until accepted.
    pub max_attempts: Option<u32>,
    /// First date (inclusive) to request
    pub date_from: Option<NaiveDate>,
    /// Last date (inclusive) to request
    pub date_to: Option<NaiveDate>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_size: 3,
            backoff_ms: 100,
            max_attempts: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl DispatchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Request options derived from the configured date range, if any
    pub fn request_options(&self) -> Option<RequestOptions> {
        let options = RequestOptions {
            from: self.date_from,
            to: self.date_to,
        };
        (!options.is_unbounded()).then_some(options)
    }
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Upper bound on how long the consumer waits between store polls
    pub poll_interval_ms: u64,
    /// chrono format string for the Date column
    pub date_format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            date_format: "%-m/%-d/%Y".to_string(),
        }
    }
}

impl ReportConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// In-process simulated weather service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Channels the service allows open at once
    pub max_channels: usize,
    /// Outstanding requests one channel accepts before rejecting
    pub max_requests_per_channel: usize,
    /// Records per result page
    pub page_size: usize,
    /// Base delay before a data-ready notification fires
    pub notify_delay_ms: u64,
    /// Random extra delay added to each notification
    pub notify_jitter_ms: u64,
    /// JSON dataset of weather records; the built-in dataset is used when unset
    pub data_file: Option<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_channels: 3,
            max_requests_per_channel: 2,
            page_size: 4,
            notify_delay_ms: 50,
            notify_jitter_ms: 50,
            data_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Reject settings the dispatcher or consumer cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.pool_size == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.pool_size must be at least 1".to_string(),
            ));
        }
        if self.dispatch.max_attempts == Some(0) {
            return Err(ConfigError::ValidationError(
                "dispatch.max_attempts must be at least 1 when set".to_string(),
            ));
        }
        if let (Some(from), Some(to)) = (self.dispatch.date_from, self.dispatch.date_to) {
            if from > to {
                return Err(ConfigError::ValidationError(format!(
                    "dispatch.date_from ({}) is after dispatch.date_to ({})",
                    from, to
                )));
            }
        }
        if self.report.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "report.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.simulator.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "simulator.page_size must be at least 1".to_string(),
            ));
        }
        if self.simulator.max_requests_per_channel == 0 {
            return Err(ConfigError::ValidationError(
                "simulator.max_requests_per_channel must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# WX Report Configuration
# Environment variables (WX_*) override these settings

[dispatch]
pool_size = 3
backoff_ms = 100
# max_attempts = 50        # unset: retry capacity rejections until accepted
# date_from = "2016-01-01"
# date_to = "2016-03-31"

[report]
poll_interval_ms = 100
date_format = "%-m/%-d/%Y"

[simulator]
max_channels = 3
max_requests_per_channel = 2
page_size = 4
notify_delay_ms = 50
notify_jitter_ms = 50
# data_file = "./data/weather.json"
"#
        .to_string()
    }
}
