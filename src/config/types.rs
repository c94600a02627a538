//! Application settings type definitions.

use crate::constants::{DEFAULT_INTRA_THREADS, http};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Filesystem locations.
    pub paths: PathsConfig,

    /// Inference engine settings.
    pub inference: InferenceConfig,

    /// Remote image settings.
    pub http: HttpConfig,

    /// Training collaborator settings.
    pub training: TrainingConfig,

    /// Remote storage sync settings.
    pub storage: StorageConfig,
}

impl Settings {
    /// Check values serde cannot rule out.
    ///
    /// Zero timeouts would disable the bound on remote requests, and a zero
    /// size limit would reject every image.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let http = &self.http;
        for (key, value) in [
            ("http.probe_timeout_secs", http.probe_timeout_secs),
            ("http.fetch_timeout_secs", http.fetch_timeout_secs),
            ("http.max_image_bytes", http.max_image_bytes),
        ] {
            if value == 0 {
                return Err(format!("{key} must be greater than 0"));
            }
        }
        if self.inference.intra_threads == 0 {
            return Err("inference.intra_threads must be at least 1".to_string());
        }
        if self.paths.models_dir.as_os_str().is_empty() {
            return Err("paths.models_dir must not be empty".to_string());
        }
        Ok(())
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding one subdirectory per training run.
    pub models_dir: PathBuf,

    /// Directory holding the dataset split files.
    pub splits_dir: PathBuf,

    /// Directory holding the training images.
    pub images_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            splits_dir: PathBuf::from("data/dataset_files"),
            images_dir: PathBuf::from("data/images"),
        }
    }
}

/// Inference engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Intra-op threads per ONNX session.
    pub intra_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

/// Remote image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout of the reachability probe in seconds.
    pub probe_timeout_secs: u64,

    /// Timeout of an image download in seconds.
    pub fetch_timeout_secs: u64,

    /// Largest accepted image in bytes.
    pub max_image_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: http::DEFAULT_PROBE_TIMEOUT_SECS,
            fetch_timeout_secs: http::DEFAULT_FETCH_TIMEOUT_SECS,
            max_image_bytes: http::DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Training collaborator settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Program run for each training request.
    pub command: Option<PathBuf>,

    /// Extra arguments passed before the generated ones.
    pub args: Vec<String>,
}

/// Remote storage sync settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Remote holding the dataset split files, e.g. `ncplants:/data/dataset_files`.
    pub remote_splits: Option<String>,

    /// Remote holding the training images.
    pub remote_images: Option<String>,

    /// Remote that trained models are pushed to.
    pub remote_models: Option<String>,

    /// Sync tool binary.
    pub rclone: Option<PathBuf>,
}
