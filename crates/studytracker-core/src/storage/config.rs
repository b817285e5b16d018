//! TOML-based application configuration.
//!
//! Stores user preferences for:
//! - Pomodoro phase lengths and the long-break cadence
//! - How often in-progress elapsed time is checkpointed
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{data_dir, CONFIG_FILE};
use crate::error::ConfigError;
use crate::pomodoro::PomodoroSettings;

/// Pomodoro cycle configuration, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default = "default_study_min")]
    pub study_min: u32,
    #[serde(default = "default_short_break_min")]
    pub short_break_min: u32,
    #[serde(default = "default_long_break_min")]
    pub long_break_min: u32,
    #[serde(default = "default_cycles_before_long_break")]
    pub cycles_before_long_break: u32,
}

/// Manual stopwatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Ticks between `elapsed_sec` checkpoints. 0 disables them.
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pomodoro: PomodoroConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

fn default_study_min() -> u32 {
    25
}
fn default_short_break_min() -> u32 {
    5
}
fn default_long_break_min() -> u32 {
    15
}
fn default_cycles_before_long_break() -> u32 {
    4
}
fn default_checkpoint_interval_secs() -> u64 {
    30
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            study_min: default_study_min(),
            short_break_min: default_short_break_min(),
            long_break_min: default_long_break_min(),
            cycles_before_long_break: default_cycles_before_long_break(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
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

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot replace a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data_dir>/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from(CONFIG_FILE),
                message: e.to_string(),
            })
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file is unreadable or unparsable.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
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

    /// Set a config value by key without persisting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Ok(())
    }

    /// Validated Pomodoro phase lengths in seconds.
    ///
    /// # Errors
    /// Returns `InvalidValue` for a zero-length phase or a zero cycle size.
    pub fn pomodoro_settings(&self) -> Result<PomodoroSettings, ConfigError> {
        let p = &self.pomodoro;
        for (key, value) in [
            ("pomodoro.study_min", p.study_min),
            ("pomodoro.short_break_min", p.short_break_min),
            ("pomodoro.long_break_min", p.long_break_min),
            ("pomodoro.cycles_before_long_break", p.cycles_before_long_break),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(PomodoroSettings {
            study_secs: u64::from(p.study_min) * 60,
            short_break_secs: u64::from(p.short_break_min) * 60,
            long_break_secs: u64::from(p.long_break_min) * 60,
            cycles_before_long_break: p.cycles_before_long_break,
            checkpoint_interval_secs: self.timer.checkpoint_interval_secs,
        })
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
