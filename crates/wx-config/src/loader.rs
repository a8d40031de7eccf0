//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "wx.toml",
    "config.toml",
    "./config/wx.toml",
    "/etc/wx/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) but reads overrides through `lookup`
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file(&lookup)? {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, &lookup)?;
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use.
    ///
    /// An explicitly requested file that does not exist is an error; the
    /// standard search paths are optional.
    fn find_config_file<F>(&self, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(ConfigError::ValidationError(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        if let Some(path) = lookup("WX_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvError(format!("{}: cannot parse {:?}", key, raw))),
        None => Ok(None),
    }
}

fn parse_date<F>(lookup: &F, key: &str) -> Result<Option<NaiveDate>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|e| ConfigError::EnvError(format!("{}: {}", key, e))),
        None => Ok(None),
    }
}

/// Apply `WX_*` overrides on top of file/default settings
fn apply_overrides<F>(config: &mut AppConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Dispatch
    if let Some(size) = parse_var(lookup, "WX_POOL_SIZE")? {
        config.dispatch.pool_size = size;
    }
    if let Some(ms) = parse_var(lookup, "WX_DISPATCH_BACKOFF_MS")? {
        config.dispatch.backoff_ms = ms;
    }
    if let Some(attempts) = parse_var(lookup, "WX_DISPATCH_MAX_ATTEMPTS")? {
        config.dispatch.max_attempts = Some(attempts);
    }
    if let Some(date) = parse_date(lookup, "WX_DATE_FROM")? {
        config.dispatch.date_from = Some(date);
    }
    if let Some(date) = parse_date(lookup, "WX_DATE_TO")? {
        config.dispatch.date_to = Some(date);
    }

    // Report
    if let Some(ms) = parse_var(lookup, "WX_REPORT_POLL_INTERVAL_MS")? {
        config.report.poll_interval_ms = ms;
    }
    if let Some(format) = lookup("WX_REPORT_DATE_FORMAT") {
        config.report.date_format = format;
    }

    // Simulator
    if let Some(max) = parse_var(lookup, "WX_SIM_MAX_CHANNELS")? {
        config.simulator.max_channels = max;
    }
    if let Some(max) = parse_var(lookup, "WX_SIM_MAX_REQUESTS")? {
        config.simulator.max_requests_per_channel = max;
    }
    if let Some(size) = parse_var(lookup, "WX_SIM_PAGE_SIZE")? {
        config.simulator.page_size = size;
    }
    if let Some(ms) = parse_var(lookup, "WX_SIM_NOTIFY_DELAY_MS")? {
        config.simulator.notify_delay_ms = ms;
    }
    if let Some(ms) = parse_var(lookup, "WX_SIM_NOTIFY_JITTER_MS")? {
        config.simulator.notify_jitter_ms = ms;
    }
    if let Some(path) = lookup("WX_SIM_DATA_FILE") {
        config.simulator.data_file = Some(path);
    }

    Ok(())
}
