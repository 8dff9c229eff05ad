//! XDG Base Directory lookups

use crate::error::ConfigError;
use std::path::PathBuf;

/// `$XDG_CONFIG_HOME` if set, else the platform config directory
pub fn config_home() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| {
            ConfigError::Invalid(
                "Could not determine config home directory (HOME not set)".to_string(),
            )
        })
}

/// `<config home>/enkan/config.toml`
pub fn global_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_home()?.join("enkan").join("config.toml"))
}
