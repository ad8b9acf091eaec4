use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::models::usage::PrimaryMetric;
use crate::core::notifier::DEFAULT_THRESHOLDS;

/// Polling faster than this is never allowed.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_true")]
    pub auto_detect_credentials: bool,
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
}

fn default_true() -> bool {
    true
}
fn default_refresh_interval() -> u64 {
    60
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            auto_detect_credentials: true,
            debug_logging: false,
            refresh_interval_seconds: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u32>,
    #[serde(default)]
    pub primary_metric: PrimaryMetric,
}

fn default_thresholds() -> Vec<u32> {
    DEFAULT_THRESHOLDS.to_vec()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: default_thresholds(),
            primary_metric: PrimaryMetric::default(),
        }
    }
}

/// How the one-line status indicator is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Percentage,
    Bar,
    Compact,
}

impl DisplayMode {
    /// percentage → bar → compact → percentage
    pub fn next(self) -> Self {
        match self {
            Self::Percentage => Self::Bar,
            Self::Bar => Self::Compact,
            Self::Compact => Self::Percentage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Bar => "bar",
            Self::Compact => "compact",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default)]
    pub status_bar_display: DisplayMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("claudewatch").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Refresh period with the 10 second floor applied.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.monitor
                .refresh_interval_seconds
                .max(MIN_REFRESH_INTERVAL_SECS),
        )
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.monitor.refresh_interval_seconds < MIN_REFRESH_INTERVAL_SECS {
            issues.push(format!(
                "refresh_interval_seconds = {} is below the minimum of {}; {} will be used",
                self.monitor.refresh_interval_seconds,
                MIN_REFRESH_INTERVAL_SECS,
                MIN_REFRESH_INTERVAL_SECS
            ));
        }
        if self.notifications.thresholds.is_empty() && self.notifications.enabled {
            issues.push("Notifications are enabled but no thresholds are configured".to_string());
        }
        for t in &self.notifications.thresholds {
            if *t == 0 || *t > 100 {
                issues.push(format!("Threshold {} is outside 1..=100", t));
            }
        }
        let mut sorted = self.notifications.thresholds.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != self.notifications.thresholds.len() {
            issues.push("Duplicate thresholds are ignored".to_string());
        }
        issues
    }
}
