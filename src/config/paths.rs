//! Platform-specific configuration paths.

use crate::constants::APP_NAME;
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Settings file name inside the configuration directory.
const SETTINGS_FILE: &str = "settings.toml";

/// Get the configuration directory for the current platform.
///
/// - Linux: `~/.config/imgclas/`
/// - macOS: `~/Library/Application Support/imgclas/`
/// - Windows: `%APPDATA%\imgclas\`
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the settings file.
pub fn settings_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Settings file to use: `explicit` when given (`--settings`), otherwise the
/// platform default.
///
/// A directory given explicitly is taken to hold `settings.toml`.
pub fn resolve_settings_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.is_dir() => Ok(path.join(SETTINGS_FILE)),
        Some(path) => Ok(path.to_path_buf()),
        None => settings_file_path(),
    }
}
