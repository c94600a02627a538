//! Folder-level sync with remote storage.

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};

/// Copies folders between local disk and a remote.
pub trait StorageSync: Send + Sync {
    /// Copy the contents of `from` into `to`.
    fn copy(&self, from: &str, to: &str) -> Result<()>;
}

/// Sync through the `rclone` command line tool.
#[derive(Debug, Clone)]
pub struct RcloneSync {
    binary: PathBuf,
}

impl RcloneSync {
    /// Use `binary`, or `rclone` from `PATH` when unset.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from("rclone")),
        }
    }

    /// Build from storage settings.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.rclone.clone())
    }
}

impl StorageSync for RcloneSync {
    fn copy(&self, from: &str, to: &str) -> Result<()> {
        let sync_err = |reason: String| Error::Sync {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };

        debug!("{} copy {from} {to}", self.binary.display());
        let output = Command::new(&self.binary)
            .args(["copy", from, to])
            .output()
            .map_err(|e| sync_err(e.to_string()))?;

        if !output.status.success() {
            return Err(sync_err(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!("Synced {from} to {to}");
        Ok(())
    }
}

/// Sync that does nothing, for deployments without remote storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSync;

impl StorageSync for NoSync {
    fn copy(&self, _from: &str, _to: &str) -> Result<()> {
        Ok(())
    }
}

/// Copy and downgrade any failure to a warning.
pub fn copy_or_warn(sync: &dyn StorageSync, from: &str, to: &str) {
    if let Err(e) = sync.copy(from, to) {
        warn!("{e}");
    }
}
