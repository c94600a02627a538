//! Seam between the serving path and the inference engine.

use crate::config::FlatConfig;
use crate::error::Result;
use crate::models::store::ClassMetadata;
use image::DynamicImage;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A loaded network able to score a batch of images.
///
/// Implementations own whatever thread or device affinity the engine needs.
pub trait ModelHandle: Send + Sync {
    /// Return one probability vector over all classes per input image.
    fn predict(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>>;
}

/// Builds [`ModelHandle`]s from checkpoint files.
pub trait ModelLoader: Send + Sync {
    /// Load the checkpoint at `checkpoint` bound to the merged configuration.
    fn load(&self, checkpoint: &Path, config: &FlatConfig) -> Result<Box<dyn ModelHandle>>;
}

/// The model resident in memory together with its class information.
///
/// Shared read-only during inference. Replaced as a whole, never mutated.
pub struct LoadedModel {
    /// Training run the model comes from.
    pub timestamp: String,
    /// Checkpoint file name.
    pub checkpoint: String,
    /// Engine handle.
    pub handle: Box<dyn ModelHandle>,
    /// Class names, indexed by label id.
    pub class_names: Vec<String>,
    /// Class metadata, same length as `class_names`.
    pub class_metadata: Vec<ClassMetadata>,
    /// Configuration the model was loaded with.
    pub config: Arc<FlatConfig>,
}

impl LoadedModel {
    /// Whether this is the model for `(timestamp, checkpoint)`.
    pub fn matches(&self, timestamp: &str, checkpoint: &str) -> bool {
        self.timestamp == timestamp && self.checkpoint == checkpoint
    }

    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("timestamp", &self.timestamp)
            .field("checkpoint", &self.checkpoint)
            .field("num_classes", &self.class_names.len())
            .finish_non_exhaustive()
    }
}
