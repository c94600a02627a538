//! On-disk layout of the models root.
//!
//! ```text
//! <root>/<timestamp>/ckpts/<checkpoint>.onnx
//! <root>/<timestamp>/conf/conf.json
//! <root>/<timestamp>/dataset_files/classes.txt
//! <root>/<timestamp>/dataset_files/info.txt      (optional)
//! ```

use crate::config::FlatConfig;
use crate::constants::{REQUEST_OPTION_GROUP, layout};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Free-form class metadata: a string, or a JSON object.
pub type ClassMetadata = serde_json::Value;

/// Read-mostly view over a models root directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Create a store rooted at `root`. The directory does not need to exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Models root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a training run.
    pub fn timestamp_dir(&self, timestamp: &str) -> PathBuf {
        self.root.join(timestamp)
    }

    /// Checkpoints directory of a training run.
    pub fn checkpoints_dir(&self, timestamp: &str) -> PathBuf {
        self.timestamp_dir(timestamp).join(layout::CHECKPOINTS_DIR)
    }

    /// Path of a checkpoint file.
    pub fn checkpoint_path(&self, timestamp: &str, checkpoint: &str) -> PathBuf {
        self.checkpoints_dir(timestamp).join(checkpoint)
    }

    /// Saved configuration of a training run.
    pub fn conf_path(&self, timestamp: &str) -> PathBuf {
        self.timestamp_dir(timestamp)
            .join(layout::CONF_DIR)
            .join(layout::CONF_FILE)
    }

    /// Dataset splits directory of a training run.
    pub fn splits_dir(&self, timestamp: &str) -> PathBuf {
        self.timestamp_dir(timestamp).join(layout::SPLITS_DIR)
    }

    /// Sorted names of the training runs. A missing root yields none.
    pub fn timestamps(&self) -> Result<Vec<String>> {
        list_sorted(&self.root, |path| path.is_dir())
    }

    /// Sorted names of the `.onnx` checkpoints of a run.
    pub fn checkpoints(&self, timestamp: &str) -> Result<Vec<String>> {
        list_sorted(&self.checkpoints_dir(timestamp), |path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == layout::CHECKPOINT_EXTENSION)
        })
    }

    /// Class names of a run, one per non-empty line. Index is the label id.
    pub fn class_names(&self, timestamp: &str) -> Result<Vec<String>> {
        let path = self.splits_dir(timestamp).join(layout::CLASSES_FILE);
        let contents = fs::read_to_string(&path).map_err(|e| Error::ClassNamesRead {
            path: path.clone(),
            source: e,
        })?;

        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Per-class metadata of a run, aligned by line with the class names.
    ///
    /// Returns `None` when the run has no metadata file. Lines holding a JSON
    /// object become records, blank lines and `-` become empty strings.
    pub fn class_metadata(&self, timestamp: &str) -> Result<Option<Vec<ClassMetadata>>> {
        let path = self.splits_dir(timestamp).join(layout::INFO_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)?;
        Ok(Some(contents.lines().map(parse_metadata_line).collect()))
    }

    /// Saved training configuration of a run.
    pub fn saved_config(&self, timestamp: &str) -> Result<FlatConfig> {
        let path = self.conf_path(timestamp);
        let read_err = |source: Box<dyn std::error::Error + Send + Sync>| Error::SavedConfigRead {
            path: path.clone(),
            source,
        };

        let contents = fs::read_to_string(&path).map_err(|e| read_err(Box::new(e)))?;
        serde_json::from_str(&contents).map_err(|e| read_err(Box::new(e)))
    }

    /// Create the directory layout of a new run and write its configuration.
    ///
    /// The request option group is left out: a run's saved configuration
    /// describes how it was trained, not which run later requests select.
    pub fn create_run(&self, timestamp: &str, config: &FlatConfig) -> Result<PathBuf> {
        let dir = self.timestamp_dir(timestamp);
        fs::create_dir_all(self.checkpoints_dir(timestamp))?;
        fs::create_dir_all(self.splits_dir(timestamp))?;

        let conf_path = self.conf_path(timestamp);
        if let Some(parent) = conf_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut saved = config.clone();
        saved.0.remove(REQUEST_OPTION_GROUP);
        let json = serde_json::to_string_pretty(&saved)
            .map_err(|e| Error::ResponseSerialize { source: e })?;
        fs::write(&conf_path, json)?;

        debug!("Created run directory {}", dir.display());
        Ok(dir)
    }
}

fn list_sorted(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !keep(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn parse_metadata_line(line: &str) -> ClassMetadata {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed == layout::EMPTY_INFO_MARKER {
        return ClassMetadata::String(String::new());
    }
    if trimmed.starts_with('{')
        && let Ok(record @ serde_json::Value::Object(_)) =
            serde_json::from_str::<serde_json::Value>(trimmed)
    {
        return record;
    }
    ClassMetadata::String(trimmed.to_string())
}
