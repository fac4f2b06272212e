//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Dose periods and their items
//! - Day cutover hour
//! - Notification and sound preferences
//! - Escalation table and reminder limits
//! - Terminal wrapper for launched reminders
//!
//! Configuration is stored at `~/.config/medminder/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::data_dir;
use super::log_store::{JsonFileLogStore, LogStore};
use crate::alert::notify::{ConsoleNotifier, DesktopNotifier, Notifier, DEFAULT_ICON};
use crate::alert::sound::{default_players, AlarmPlayer, DEFAULT_SOUND};
use crate::checker::{default_terminal, ProcessLauncher};
use crate::day_key::{DayKeyResolver, DEFAULT_CUTOVER_HOUR};
use crate::error::ConfigError;
use crate::period::{default_periods, DosePeriod};
use crate::reminder::escalation::EscalationPolicy;
use crate::reminder::DEFAULT_MAX_REMINDERS;

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Desktop notifications; when off every notification goes to stdout.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_icon")]
    pub icon: String,
}

/// Alarm sound configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sound_file")]
    pub file: PathBuf,
    /// Tried in order; the first that plays the file wins.
    #[serde(default = "default_players")]
    pub players: Vec<String>,
}

/// How `check` launches reminder processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Command prefix giving the reminder a terminal. Empty runs it
    /// directly, which only works when `check` itself has one.
    #[serde(default = "default_terminal")]
    pub terminal: Vec<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/medminder/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hours before this belong to the previous day.
    #[serde(default = "default_cutover_hour")]
    pub cutover_hour: u32,
    /// Period reminded when `remind` gets no name or an unknown one.
    #[serde(default = "default_period_name")]
    pub default_period: String,
    /// Dose log location; `~/med_log.json` when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default = "default_max_reminders")]
    pub max_reminders: u32,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub sound: SoundConfig,
    #[serde(default)]
    pub escalation: EscalationPolicy,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default = "default_periods")]
    pub periods: Vec<DosePeriod>,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_icon() -> String {
    DEFAULT_ICON.into()
}
fn default_sound_file() -> PathBuf {
    PathBuf::from(DEFAULT_SOUND)
}
fn default_cutover_hour() -> u32 {
    DEFAULT_CUTOVER_HOUR
}
fn default_period_name() -> String {
    "morning".into()
}
fn default_max_reminders() -> u32 {
    DEFAULT_MAX_REMINDERS
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            icon: default_icon(),
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: default_sound_file(),
            players: default_players(),
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            terminal: default_terminal(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cutover_hour: default_cutover_hour(),
            default_period: default_period_name(),
            log_path: None,
            max_reminders: default_max_reminders(),
            notifications: NotificationsConfig::default(),
            sound: SoundConfig::default(),
            escalation: EscalationPolicy::default(),
            launcher: LauncherConfig::default(),
            periods: default_periods(),
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
            current = match current {
                serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(String::new()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let slot = match current {
                serde_json::Value::Array(items) => part
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i)),
                serde_json::Value::Object(obj) => obj.get_mut(part),
                _ => None,
            }
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

            if parts.peek().is_none() {
                let new_value = match slot {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };
                *slot = new_value;
                return Ok(());
            }

            current = slot;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// `config.toml` inside the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// A missing file is created with the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// [`Config::load`] against an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.message().to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                tracing::info!(path = %path.display(), "wrote default config");
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    ///
    /// Reminders must fire even with a broken config file, so the error is
    /// only logged.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default config");
            Self::default()
        })
    }

    /// Reject values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.cutover_hour > 23 {
            return Err(invalid("cutover_hour", "must be between 0 and 23"));
        }
        if self.periods.is_empty() {
            return Err(invalid("periods", "at least one period is required"));
        }
        for (i, period) in self.periods.iter().enumerate() {
            if period.name.trim().is_empty() {
                return Err(invalid(&format!("periods.{i}.name"), "must not be empty"));
            }
            if period.items.is_empty() {
                return Err(invalid(&format!("periods.{i}.items"), "must list at least one item"));
            }
            if self.periods[..i].iter().any(|p| p.name == period.name) {
                return Err(invalid(&format!("periods.{i}.name"), "duplicate period name"));
            }
        }
        let mut last = 0;
        for tier in &self.escalation.wait_tiers {
            if tier.through_attempt <= last {
                return Err(invalid(
                    "escalation.wait_tiers",
                    "through_attempt must be strictly increasing",
                ));
            }
            last = tier.through_attempt;
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    ///
    /// Array elements are addressed by index, e.g. `periods.0.due_after`.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// [`Config::set`] without saving.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn period(&self, name: &str) -> Option<&DosePeriod> {
        self.periods.iter().find(|p| p.name == name)
    }

    /// The period called `name`, falling back to the default period and
    /// then to the first configured one.
    pub fn resolve_period(&self, name: Option<&str>) -> DosePeriod {
        if let Some(name) = name {
            if let Some(period) = self.period(name) {
                return period.clone();
            }
            tracing::warn!(requested = name, fallback = %self.default_period, "unknown period");
        }
        self.period(&self.default_period)
            .or_else(|| self.periods.first())
            .cloned()
            .unwrap_or_else(|| default_periods().remove(0))
    }

    /// Per-period limit if set, otherwise the global one.
    pub fn max_reminders_for(&self, period: &DosePeriod) -> u32 {
        period.max_reminders.unwrap_or(self.max_reminders)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(JsonFileLogStore::default_path)
    }

    pub fn log_store(&self) -> Arc<dyn LogStore> {
        Arc::new(JsonFileLogStore::new(self.log_path()))
    }

    pub fn resolver(&self) -> DayKeyResolver {
        DayKeyResolver::new(self.cutover_hour)
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        if self.notifications.enabled {
            Arc::new(DesktopNotifier::new("notify-send", &self.notifications.icon))
        } else {
            Arc::new(ConsoleNotifier)
        }
    }

    pub fn launcher(&self) -> ProcessLauncher {
        ProcessLauncher::new(self.launcher.terminal.clone())
    }

    pub fn alarm_player(&self) -> AlarmPlayer {
        if self.sound.enabled {
            AlarmPlayer::new(&self.sound.file, self.sound.players.clone())
        } else {
            AlarmPlayer::disabled()
        }
    }
}
