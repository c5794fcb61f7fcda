//! Dashboard configuration loading from dashboard.toml
//!
//! This module loads the settings of one dashboard instance: its identity
//! (which keys the persisted change state), donor-privacy label, accepted
//! timestamp formats and where the example runner reads its input tables.

use crate::{
    core::{privacy::DEFAULT_ANONYMOUS_LABEL, schema},
    errors::{Error, Result},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

/// Configuration structure representing the entire dashboard.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Settings of the dashboard instance
    pub dashboard: DashboardSettings,
    /// Input locations for the example runner
    #[serde(default)]
    pub sources: SourceConfig,
}

/// Settings for a single dashboard instance
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DashboardSettings {
    /// Instance identifier; each instance owns its own change state
    pub id: String,
    /// Display name used when a donor left no public contact
    #[serde(default = "default_anonymous_label")]
    pub anonymous_label: String,
    /// Timestamp formats tried in order; empty means the built-in list
    #[serde(default)]
    pub timestamp_formats: Vec<String>,
}

impl DashboardSettings {
    /// Settings with the given id and all defaults.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            anonymous_label: default_anonymous_label(),
            timestamp_formats: Vec::new(),
        }
    }

    /// Configured timestamp formats, or the built-in day-first list.
    #[must_use]
    pub fn effective_timestamp_formats(&self) -> Vec<String> {
        if self.timestamp_formats.is_empty() {
            schema::default_timestamp_formats()
        } else {
            self.timestamp_formats.clone()
        }
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Where the example runner reads the two raw tables
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// JSON file holding the targets table
    #[serde(default = "default_targets_path")]
    pub targets_path: PathBuf,
    /// JSON file holding the donations table
    #[serde(default = "default_donations_path")]
    pub donations_path: PathBuf,
    /// Seconds between refresh cycles; 0 runs a single cycle
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            targets_path: default_targets_path(),
            donations_path: default_donations_path(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_anonymous_label() -> String {
    DEFAULT_ANONYMOUS_LABEL.to_string()
}

fn default_targets_path() -> PathBuf {
    PathBuf::from("data/targets.json")
}

fn default_donations_path() -> PathBuf {
    PathBuf::from("data/donations.json")
}

const fn default_refresh_interval_secs() -> u64 {
    5
}

/// Loads dashboard configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the dashboard.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
/// - The dashboard id is blank
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.as_ref().display()),
    })?;

    parse_config(&contents)
}

/// Parses and validates dashboard configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse dashboard.toml: {e}"),
    })?;

    if config.dashboard.id.trim().is_empty() {
        return Err(Error::Config {
            message: "dashboard.id cannot be empty".to_string(),
        });
    }

    Ok(config)
}

/// Loads configuration from `DASHBOARD_CONFIG`, falling back to ./dashboard.toml
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}
