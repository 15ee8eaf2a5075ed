use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub attendance: AttendanceConfig,
}

/// Which time zone defines the calendar day used for duplicate suppression
/// and statistics. The server's local zone matches the original deployment;
/// `utc` pins day boundaries for installations spanning zones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    #[default]
    Local,
    Utc,
}

impl DayBoundary {
    /// Calendar date of a timestamp under this boundary.
    pub fn date_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Local => ts.with_timezone(&Local).date_naive(),
            DayBoundary::Utc => ts.date_naive(),
        }
    }

    /// Hour of day (0-23) of a timestamp under this boundary.
    pub fn hour_of(&self, ts: DateTime<Utc>) -> u32 {
        match self {
            DayBoundary::Local => ts.with_timezone(&Local).hour(),
            DayBoundary::Utc => ts.hour(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Confidence at or above which a record displays as PRESENT.
    #[serde(default = "default_present_threshold")]
    pub present_threshold: f64,

    /// Confidence at or above which a record displays as LATE.
    #[serde(default = "default_late_threshold")]
    pub late_threshold: f64,

    /// How many days of presence data the in-memory cache retains.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Width of the near-duplicate window used by the sweeper, in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    #[serde(default)]
    pub day_boundary: DayBoundary,
}

fn default_present_threshold() -> f64 {
    0.9
}

fn default_late_threshold() -> f64 {
    0.7
}

fn default_retention_days() -> u32 {
    7
}

fn default_window_minutes() -> u32 {
    5
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            present_threshold: default_present_threshold(),
            late_threshold: default_late_threshold(),
            retention_days: default_retention_days(),
            window_minutes: default_window_minutes(),
            day_boundary: DayBoundary::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rollcall")
        .join("rollcall.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            attendance: AttendanceConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rollcall")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}
