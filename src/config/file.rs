//! Settings file loading.

use crate::config::Settings;
use crate::config::paths::resolve_settings_path;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Load and validate settings from a TOML file.
///
/// Returns default settings if the file does not exist.
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::SettingsRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let settings: Settings = toml::from_str(&contents).map_err(|e| Error::SettingsParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    settings
        .validate()
        .map_err(|message| Error::SettingsInvalid {
            path: path.to_path_buf(),
            message,
        })?;
    Ok(settings)
}

/// Load settings from `explicit` or, without it, the platform path.
///
/// Falls back to defaults when the platform has no configuration directory.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    match resolve_settings_path(explicit) {
        Ok(path) => load_settings_file(&path),
        Err(Error::ConfigDirNotFound) => Ok(Settings::default()),
        Err(e) => Err(e),
    }
}

/// Save settings to a TOML file.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::SettingsWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(settings).map_err(|e| Error::SettingsSerialize { source: e })?;

    std::fs::write(path, contents).map_err(|e| Error::SettingsWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
