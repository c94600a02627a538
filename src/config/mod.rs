//! Configuration: application settings and the model option schema.

mod file;
mod paths;
pub mod schema;
mod store;
mod types;
mod validate;

pub use file::{load_settings, load_settings_file, save_settings};
pub use paths::{config_dir, resolve_settings_path, settings_file_path};
pub use schema::{ConfigOption, OptionGroups, OptionType, OptionValue};
pub use store::{ConfigStore, FlatConfig};
pub use types::{HttpConfig, InferenceConfig, PathsConfig, Settings, StorageConfig, TrainingConfig};
pub use validate::{min_image_size, validate_options};
