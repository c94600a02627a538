//! The training procedure collaborator.

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Runs one training job.
pub trait Trainer: Send + Sync {
    /// Train into the run directory of `timestamp`, whose configuration has
    /// already been written to `config_path`.
    fn train(&self, timestamp: &str, run_dir: &Path, config_path: &Path) -> Result<()>;
}

/// Runs an external training program.
///
/// The program is called as `<command> <args...> --timestamp <ts> --config <path>`
/// with the run directory as working directory.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    command: Option<PathBuf>,
    args: Vec<String>,
}

impl CommandTrainer {
    /// Build from training settings.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl Trainer for CommandTrainer {
    fn train(&self, timestamp: &str, run_dir: &Path, config_path: &Path) -> Result<()> {
        let training_err = |reason: String| Error::Training {
            timestamp: timestamp.to_string(),
            reason,
        };

        let command = self.command.as_ref().ok_or_else(|| {
            training_err("no training command configured (set training.command)".to_string())
        })?;

        info!("Training run {timestamp} with {}", command.display());
        let status = Command::new(command)
            .args(&self.args)
            .arg("--timestamp")
            .arg(timestamp)
            .arg("--config")
            .arg(config_path)
            .current_dir(run_dir)
            .status()
            .map_err(|e| training_err(e.to_string()))?;

        if !status.success() {
            return Err(training_err(format!("trainer exited with {status}")));
        }
        info!("Training run {timestamp} finished");
        Ok(())
    }
}
