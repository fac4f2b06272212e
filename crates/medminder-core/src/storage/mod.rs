mod config;
pub mod log_store;

pub use config::{Config, LauncherConfig, NotificationsConfig, SoundConfig};
pub use log_store::{record_dose, DayLog, DoseRecord, JsonFileLogStore, LogStore, MemoryLogStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/medminder[-dev]/` based on MEDMINDER_ENV.
///
/// Set MEDMINDER_ENV=dev to use the development data directory, or
/// MEDMINDER_CONFIG_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("MEDMINDER_CONFIG_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("MEDMINDER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("medminder-dev")
            } else {
                base_dir.join("medminder")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
