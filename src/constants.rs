//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "imgclas";

/// Default intra-op thread count for ONNX sessions.
pub const DEFAULT_INTRA_THREADS: usize = 1;

/// Uploaded file extensions accepted for classification.
///
/// Matching is case-sensitive: mixed-case variants such as `Jpg` are rejected.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "PNG", "JPG", "JPEG"];

/// Prefix of inline base64 images. These skip the reachability probe.
pub const INLINE_IMAGE_PREFIX: &str = "data:image";

/// Option group holding the per-request model selection and output knobs.
///
/// Never persisted with a training run.
pub const REQUEST_OPTION_GROUP: &str = "testing";

/// Timestamp format for new training runs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// HTTP limits for remote images.
pub mod http {
    /// Timeout for the HEAD reachability probe, in seconds.
    pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
    /// Timeout for downloading an image, in seconds.
    pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
    /// Largest accepted image payload in bytes.
    pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
}

/// On-disk layout of a models root.
pub mod layout {
    /// Checkpoints directory inside a timestamp.
    pub const CHECKPOINTS_DIR: &str = "ckpts";
    /// Checkpoint file extension.
    pub const CHECKPOINT_EXTENSION: &str = "onnx";
    /// Configuration directory inside a timestamp.
    pub const CONF_DIR: &str = "conf";
    /// Saved configuration file name.
    pub const CONF_FILE: &str = "conf.json";
    /// Dataset splits directory inside a timestamp.
    pub const SPLITS_DIR: &str = "dataset_files";
    /// Class names file.
    pub const CLASSES_FILE: &str = "classes.txt";
    /// Optional per-class metadata file.
    pub const INFO_FILE: &str = "info.txt";
    /// Placeholder meaning "no metadata" in the metadata file.
    pub const EMPTY_INFO_MARKER: &str = "-";
}

/// External reference link templates.
pub mod links {
    /// Google image search base.
    pub const GOOGLE_IMAGES: &str = "https://www.google.es/search";
    /// Wikipedia article base.
    pub const WIKIPEDIA: &str = "https://en.wikipedia.org/wiki/";
}

/// Minimum input resolution per architecture.
pub mod image_size {
    /// Xception minimum side.
    pub const XCEPTION_MIN: i64 = 71;
    /// `InceptionV3` minimum side.
    pub const INCEPTION_V3_MIN: i64 = 75;
    /// Minimum side for every other architecture.
    pub const DEFAULT_MIN: i64 = 32;
}

/// Prefix of container environment variables reported by `metadata`.
pub const CONTAINER_ENV_PREFIX: &str = "CONTAINER_";
