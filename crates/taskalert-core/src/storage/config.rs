//! TOML-based scheduler configuration.
//!
//! Stores:
//! - Reminder offsets per reminder policy
//! - Creation-announcement delays per priority
//! - Notification handler behaviour (alert, sound, badge)
//! - Notification channel settings
//!
//! Configuration is stored at `~/.config/taskalert/config.toml`.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::gateway::NotificationHandlerConfig;
use crate::permission::ChannelConfig;
use crate::task::ReminderPolicy;
use crate::trigger::{
    TriggerPolicy, DEFAULT_HIGH_DELAY_SECS, DEFAULT_LOW_DELAY_SECS, DEFAULT_MEDIUM_DELAY_SECS,
    DEFAULT_ONE_DAY_OFFSET_MIN, DEFAULT_ONE_HOUR_OFFSET_MIN, DEFAULT_REMINDER_POLICY,
    DEFAULT_TWO_DAYS_OFFSET_MIN, DEFAULT_TWO_HOURS_OFFSET_MIN, DEFAULT_UNKNOWN_DELAY_SECS,
};

/// Upper bound for any delay (seconds), ten years.
pub const MAX_DELAY_SECS: i64 = 10 * 365 * 24 * 60 * 60;
/// Upper bound for any reminder offset (minutes), ten years.
pub const MAX_OFFSET_MIN: i64 = 10 * 365 * 24 * 60;

/// Reminder offsets, in minutes before the due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_two_days")]
    pub two_days: i64,
    #[serde(default = "default_one_day")]
    pub one_day: i64,
    #[serde(default = "default_two_hours")]
    pub two_hours: i64,
    #[serde(default = "default_one_hour")]
    pub one_hour: i64,
    /// Policy for tasks that do not pick one.
    #[serde(default = "default_policy")]
    pub default_policy: ReminderPolicy,
}

/// Creation-announcement delays, in seconds after the task is saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default = "default_high")]
    pub high: i64,
    #[serde(default = "default_medium")]
    pub medium: i64,
    #[serde(default = "default_low")]
    pub low: i64,
    #[serde(default = "default_unknown")]
    pub unknown: i64,
}

/// Scheduler configuration.
///
/// Serialized to/from TOML at `~/.config/taskalert/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub delays: DelayConfig,
    #[serde(default)]
    pub handler: NotificationHandlerConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

fn default_two_days() -> i64 {
    DEFAULT_TWO_DAYS_OFFSET_MIN
}
fn default_one_day() -> i64 {
    DEFAULT_ONE_DAY_OFFSET_MIN
}
fn default_two_hours() -> i64 {
    DEFAULT_TWO_HOURS_OFFSET_MIN
}
fn default_one_hour() -> i64 {
    DEFAULT_ONE_HOUR_OFFSET_MIN
}
fn default_policy() -> ReminderPolicy {
    DEFAULT_REMINDER_POLICY
}
fn default_high() -> i64 {
    DEFAULT_HIGH_DELAY_SECS
}
fn default_medium() -> i64 {
    DEFAULT_MEDIUM_DELAY_SECS
}
fn default_low() -> i64 {
    DEFAULT_LOW_DELAY_SECS
}
fn default_unknown() -> i64 {
    DEFAULT_UNKNOWN_DELAY_SECS
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            two_days: default_two_days(),
            one_day: default_one_day(),
            two_hours: default_two_hours(),
            one_hour: default_one_hour(),
            default_policy: default_policy(),
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
            unknown: default_unknown(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<()> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown().into());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => serde_json::Value::Number(
                    value
                        .parse::<i64>()
                        .map_err(|e| invalid(e.to_string()))?
                        .into(),
                ),
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown().into())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Same as [`Config::load`] for an explicit file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the default
    /// cannot be written.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Delays and offsets must be positive and at most ten years.
    fn validate(&self) -> Result<()> {
        let checks = [
            ("reminders.two_days", self.reminders.two_days, MAX_OFFSET_MIN),
            ("reminders.one_day", self.reminders.one_day, MAX_OFFSET_MIN),
            ("reminders.two_hours", self.reminders.two_hours, MAX_OFFSET_MIN),
            ("reminders.one_hour", self.reminders.one_hour, MAX_OFFSET_MIN),
            ("delays.high", self.delays.high, MAX_DELAY_SECS),
            ("delays.medium", self.delays.medium, MAX_DELAY_SECS),
            ("delays.low", self.delays.low, MAX_DELAY_SECS),
            ("delays.unknown", self.delays.unknown, MAX_DELAY_SECS),
        ];
        for (key, value, max) in checks {
            if value <= 0 || value > max {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be between 1 and {max}, got {value}"),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Tables for the trigger calculator.
    ///
    /// Values too large for a `Duration` saturate; the calculator then
    /// drops the affected triggers.
    pub fn trigger_policy(&self) -> TriggerPolicy {
        let secs = |v: i64| Duration::try_seconds(v).unwrap_or(Duration::MAX);
        let mins = |v: i64| Duration::try_minutes(v).unwrap_or(Duration::MAX);
        TriggerPolicy {
            high_delay: secs(self.delays.high),
            medium_delay: secs(self.delays.medium),
            low_delay: secs(self.delays.low),
            unknown_delay: secs(self.delays.unknown),
            two_days_offset: mins(self.reminders.two_days),
            one_day_offset: mins(self.reminders.one_day),
            two_hours_offset: mins(self.reminders.two_hours),
            one_hour_offset: mins(self.reminders.one_hour),
            default_reminder: self.reminders.default_policy,
        }
    }
}
