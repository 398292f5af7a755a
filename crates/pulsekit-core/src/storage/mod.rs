mod config;
pub mod device;
pub mod prefs;

pub use config::{Config, IdentityConfig, QueueConfig, SessionConfig, SyncConfig};
pub use device::get_or_create_device_hash;
pub use prefs::{DailyDuration, PrefsStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `PULSEKIT_HOME` wins when set. Otherwise `~/.config/pulsekit[-dev]/`,
/// selected by `PULSEKIT_ENV=dev`.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("PULSEKIT_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir().ok_or(ConfigError::NoDataDir)?.join(".config");
            let env = std::env::var("PULSEKIT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pulsekit-dev")
            } else {
                base_dir.join("pulsekit")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
