//! Error types for imgclas.

/// Result type alias for imgclas operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A configuration option that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for '{group}.{key}': {message}")]
pub struct ValidationError {
    /// Option group name.
    pub group: String,
    /// Option key within the group.
    pub key: String,
    /// Description of the violation.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for `group.key`.
    pub fn new(group: &str, key: &str, message: impl Into<String>) -> Self {
        Self {
            group: group.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Coarse error classes used to pick an HTTP status or a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable. Never retried.
    ClientInput,
    /// The requested model or checkpoint does not exist.
    ModelAvailability,
    /// A persisted model artifact could not be loaded.
    InternalLoad,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Process exit code for the CLI.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Internal => 1,
            Self::ClientInput => 2,
            Self::ModelAvailability => 3,
            Self::InternalLoad => 4,
        }
    }

    /// Status code for HTTP transports.
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ClientInput => 400,
            Self::ModelAvailability => 404,
            Self::InternalLoad | Self::Internal => 500,
        }
    }
}

/// Top-level error type for imgclas.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read settings file.
    #[error("failed to read settings file '{path}'")]
    SettingsRead {
        /// Path to the settings file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse settings file.
    #[error("failed to parse settings file '{path}'")]
    SettingsParse {
        /// Path to the settings file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Settings file holds values the application cannot run with.
    #[error("invalid settings in '{path}': {message}")]
    SettingsInvalid {
        /// Path to the settings file.
        path: std::path::PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Failed to write settings file.
    #[error("failed to write settings file '{path}'")]
    SettingsWrite {
        /// Path to the settings file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize settings.
    #[error("failed to serialize settings")]
    SettingsSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// The bundled option schema is malformed.
    #[error("invalid option schema: {message}")]
    SchemaInvalid {
        /// Description of the schema problem.
        message: String,
    },

    /// A request override was not valid JSON.
    #[error("option '{key}' is not valid JSON: {value}")]
    OverrideNotJson {
        /// Option key.
        key: String,
        /// Raw value as received.
        value: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A request override failed validation.
    #[error("bad request: {0}")]
    InvalidOverride(#[source] ValidationError),

    /// Option group not present in the schema.
    #[error("unknown option group '{group}'. Available groups are: {available:?}")]
    UnknownGroup {
        /// Requested group.
        group: String,
        /// Groups of the schema.
        available: Vec<String>,
    },

    /// Request had both urls and files, or neither.
    #[error("you must provide either 'url' or 'data' in the payload")]
    AmbiguousQuery,

    /// Request input list was empty.
    #[error("empty query")]
    EmptyQuery,

    /// Uploaded file has an extension outside the allow-list.
    #[error("local image format error: '{filename}' is not in a standard image format ({allowed})")]
    UnsupportedExtension {
        /// Name of the rejected file.
        filename: String,
        /// Allowed extensions, comma-separated.
        allowed: String,
    },

    /// A local input file could not be read.
    #[error("could not read input file '{path}'")]
    InputFileRead {
        /// Path given by the caller.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// URL could not be reached.
    #[error("failed url connection: check you wrote the url address correctly ({url})")]
    UnreachableUrl {
        /// URL that failed.
        url: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// URL does not point to an image.
    #[error(
        "url image format error: '{url}' reports content type '{content_type}'; check you did not upload a preview of the image rather than the image itself"
    )]
    NotAnImage {
        /// URL that was probed.
        url: String,
        /// Content type reported by the server.
        content_type: String,
    },

    /// Image bytes could not be decoded.
    #[error("could not decode image '{source_name}'")]
    InvalidImage {
        /// URL or file name of the image.
        source_name: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Image exceeded the configured size limit.
    #[error("image '{source_name}' exceeds the {limit} byte limit")]
    ImageTooLarge {
        /// URL or file name of the image.
        source_name: String,
        /// Configured limit in bytes.
        limit: u64,
    },

    /// No timestamp directories exist under the models root.
    #[error(
        "you have no models in your models folder ({root}) to be used for inference; the service can only be used for training"
    )]
    NoModelsAvailable {
        /// Models root directory.
        root: std::path::PathBuf,
    },

    /// Requested timestamp does not exist.
    #[error("invalid timestamp name: {requested}. Available timestamp names are: {available:?}")]
    UnknownTimestamp {
        /// Requested timestamp.
        requested: String,
        /// Timestamps found on disk.
        available: Vec<String>,
    },

    /// Timestamp has no checkpoints.
    #[error(
        "you have no checkpoints in your '{timestamp}' checkpoints folder to be used for inference"
    )]
    NoCheckpointsAvailable {
        /// Timestamp that was inspected.
        timestamp: String,
    },

    /// Requested checkpoint does not exist.
    #[error("invalid checkpoint name: {requested}. Available checkpoint names are: {available:?}")]
    UnknownCheckpoint {
        /// Requested checkpoint.
        requested: String,
        /// Checkpoints found on disk.
        available: Vec<String>,
    },

    /// Failed to read the class names file.
    #[error("failed to read class names '{path}'")]
    ClassNamesRead {
        /// Path to the class names file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read or parse a saved training configuration.
    #[error("failed to load saved configuration '{path}'")]
    SavedConfigRead {
        /// Path to the configuration file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Saved training configuration failed validation.
    #[error("saved configuration of timestamp '{timestamp}' is inconsistent")]
    SavedConfigInvalid {
        /// Timestamp whose configuration failed.
        timestamp: String,
        /// Validation failure.
        #[source]
        source: ValidationError,
    },

    /// Failed to construct a model from its checkpoint.
    #[error("failed to load checkpoint '{path}': {reason}")]
    CheckpointLoad {
        /// Path to the checkpoint.
        path: std::path::PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Inference failed.
    #[error("inference failed: {reason}")]
    Inference {
        /// Description of the inference failure.
        reason: String,
    },

    /// Training run failed.
    #[error("training run '{timestamp}' failed: {reason}")]
    Training {
        /// Timestamp of the run.
        timestamp: String,
        /// Description of the failure.
        reason: String,
    },

    /// Remote storage sync failed.
    #[error("failed to sync '{from}' to '{to}': {reason}")]
    Sync {
        /// Source location.
        from: String,
        /// Destination location.
        to: String,
        /// Description of the failure.
        reason: String,
    },

    /// Failed to serialize a response.
    #[error("failed to serialize response")]
    ResponseSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::OverrideNotJson { .. }
            | Self::InvalidOverride(_)
            | Self::UnknownGroup { .. }
            | Self::AmbiguousQuery
            | Self::EmptyQuery
            | Self::UnsupportedExtension { .. }
            | Self::InputFileRead { .. }
            | Self::UnreachableUrl { .. }
            | Self::NotAnImage { .. }
            | Self::InvalidImage { .. }
            | Self::ImageTooLarge { .. } => ErrorKind::ClientInput,
            Self::NoModelsAvailable { .. }
            | Self::UnknownTimestamp { .. }
            | Self::NoCheckpointsAvailable { .. }
            | Self::UnknownCheckpoint { .. } => ErrorKind::ModelAvailability,
            Self::ClassNamesRead { .. }
            | Self::SavedConfigRead { .. }
            | Self::SavedConfigInvalid { .. }
            | Self::CheckpointLoad { .. } => ErrorKind::InternalLoad,
            _ => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        assert_eq!(Error::EmptyQuery.kind(), ErrorKind::ClientInput);
        assert_eq!(Error::AmbiguousQuery.kind().http_status(), 400);
        let err = Error::InvalidOverride(ValidationError::new("testing", "top_k", "bad"));
        assert_eq!(err.kind().exit_code(), 2);
    }

    #[test]
    fn test_unknown_timestamp_lists_alternatives() {
        let err = Error::UnknownTimestamp {
            requested: "api".to_string(),
            available: vec!["2023-01-01".to_string()],
        };
        assert_eq!(err.kind(), ErrorKind::ModelAvailability);
        let message = err.to_string();
        assert!(message.contains("api"));
        assert!(message.contains("2023-01-01"));
    }

    #[test]
    fn test_validation_error_names_option() {
        let err = ValidationError::new("model", "modelname", "not among choices");
        assert_eq!(
            err.to_string(),
            "invalid value for 'model.modelname': not among choices"
        );
    }
}
