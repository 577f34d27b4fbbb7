//! TOML configuration with defaults for every field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::data::{APP_NAME, DEFAULT_EVENT_SOURCE_URL};
use crate::error::ConfigError;
use crate::search::DEFAULT_SEARCH_LIMIT;
use crate::stats::{StatsSettings, TrendThresholds};

/// Longest story window accepted, ten years.
pub const MAX_WINDOW_HOURS: i64 = 24 * 366 * 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub event_source_url: String,
    pub refresh_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub window_hours: i64,
    pub continent_up_threshold: usize,
    pub country_up_threshold: usize,
    pub search_limit: usize,
    /// JSON catalog to use instead of the bundled one
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let thresholds = TrendThresholds::default();
        Self {
            event_source_url: DEFAULT_EVENT_SOURCE_URL.to_string(),
            refresh_interval_secs: 60,
            fetch_timeout_secs: 10,
            window_hours: 48,
            continent_up_threshold: thresholds.continent_up,
            country_up_threshold: thresholds.country_up,
            search_limit: DEFAULT_SEARCH_LIMIT,
            catalog_path: None,
        }
    }
}

impl Config {
    /// `<config dir>/geoatlas/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_WINDOW_HOURS).contains(&self.window_hours) {
            return Err(ConfigError::OutOfRange {
                field: "window_hours",
                value: self.window_hours,
                allowed: "1..=87840",
            });
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Load `path` if given, else the default location if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn stats_settings(&self) -> StatsSettings {
        StatsSettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            window: TimeDelta::hours(self.window_hours.clamp(1, MAX_WINDOW_HOURS)),
            thresholds: TrendThresholds {
                continent_up: self.continent_up_threshold,
                country_up: self.country_up_threshold,
            },
        }
    }
}
