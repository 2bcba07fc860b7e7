//! Configuration system for clanpulse.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Path to the group registry database.
    pub db_path: PathBuf,
    /// Seconds between aggregation cycles (default: 600).
    pub cycle_interval_secs: u64,
    /// Maximum messages fetched per channel per reconciliation
    /// (default: 100). History beyond this page is excluded; heavy
    /// channels undercount the month window.
    pub fetch_limit: usize,
    /// Per-channel history fetch timeout in seconds (default: 5).
    pub fetch_timeout_secs: u64,
    /// Reconciliation lookback in days (default: 30).
    pub lookback_days: i64,
    /// Score threshold below which the LOW alert tier applies
    /// (default: 2.0).
    pub low_threshold: f64,
    /// Whether to run an aggregation cycle immediately on start
    /// (default: false).
    pub run_on_start: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let clanpulse_dir = dirs::home_dir()
            .map(|h| h.join(".clanpulse"))
            .unwrap_or_else(|| PathBuf::from(".clanpulse"));

        Self {
            db_path: clanpulse_dir.join("groups.db"),
            cycle_interval_secs: 600,
            fetch_limit: 100,
            fetch_timeout_secs: 5,
            lookback_days: 30,
            low_threshold: 2.0,
            run_on_start: false,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::ClanPulseResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| crate::error::ClanPulseError::Configuration(e.to_string())),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| crate::error::ClanPulseError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| crate::error::ClanPulseError::Configuration(e.to_string())),
            _ => Err(crate::error::ClanPulseError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `CLANPULSE_DB_PATH`
    /// - `CLANPULSE_CYCLE_INTERVAL_SECS`
    /// - `CLANPULSE_FETCH_LIMIT`
    /// - `CLANPULSE_FETCH_TIMEOUT_SECS`
    /// - `CLANPULSE_LOOKBACK_DAYS`
    /// - `CLANPULSE_LOW_THRESHOLD`
    /// - `CLANPULSE_RUN_ON_START`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("CLANPULSE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(secs) = std::env::var("CLANPULSE_CYCLE_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.cycle_interval_secs = secs;
            }
        }
        if let Ok(limit) = std::env::var("CLANPULSE_FETCH_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.fetch_limit = limit;
            }
        }
        if let Ok(secs) = std::env::var("CLANPULSE_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.fetch_timeout_secs = secs;
            }
        }
        if let Ok(days) = std::env::var("CLANPULSE_LOOKBACK_DAYS") {
            if let Ok(days) = days.parse() {
                config.lookback_days = days;
            }
        }
        if let Ok(threshold) = std::env::var("CLANPULSE_LOW_THRESHOLD") {
            if let Ok(threshold) = threshold.parse() {
                config.low_threshold = threshold;
            }
        }
        if std::env::var("CLANPULSE_RUN_ON_START").is_ok() {
            config.run_on_start = true;
        }

        config
    }

    /// Builder method to set the database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Builder method to set the cycle interval, clamped to at least one
    /// second.
    pub fn with_cycle_interval_secs(mut self, secs: u64) -> Self {
        self.cycle_interval_secs = secs.max(1);
        self
    }

    /// Enable running a cycle immediately on start.
    pub fn with_run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }

    /// Cycle interval as a `Duration`.
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    /// Fetch timeout as a `Duration`.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
