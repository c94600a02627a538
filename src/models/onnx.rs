//! ONNX Runtime backed model loader.

use crate::config::FlatConfig;
use crate::error::{Error, Result};
use crate::models::engine::{ModelHandle, ModelLoader};
use crate::models::preprocess::Preprocess;
use image::DynamicImage;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Loads `.onnx` checkpoints into ONNX Runtime sessions.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    intra_threads: usize,
}

impl OnnxLoader {
    /// Create a loader whose sessions use `intra_threads` intra-op threads.
    pub fn new(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, checkpoint: &Path, config: &FlatConfig) -> Result<Box<dyn ModelHandle>> {
        let preprocess = Preprocess::from_config(config)?;

        info!("Loading checkpoint: {}", checkpoint.display());
        let session =
            build_session(checkpoint, self.intra_threads).map_err(|reason| Error::CheckpointLoad {
                path: checkpoint.to_path_buf(),
                reason,
            })?;
        debug!(
            "Session ready: input {}x{}, {} intra-op thread(s)",
            preprocess.image_size, preprocess.image_size, self.intra_threads
        );

        Ok(Box::new(OnnxHandle {
            session: Mutex::new(session),
            preprocess,
        }))
    }
}

// Parallel execution stays off: one request runs one graph at a time.
fn build_session(path: &Path, intra_threads: usize) -> std::result::Result<Session, String> {
    Session::builder()
        .map_err(|e| e.to_string())?
        .with_intra_threads(intra_threads)
        .map_err(|e| e.to_string())?
        .with_parallel_execution(false)
        .map_err(|e| e.to_string())?
        .commit_from_file(path)
        .map_err(|e| e.to_string())
}

struct OnnxHandle {
    session: Mutex<Session>,
    preprocess: Preprocess,
}

fn inference_error(e: impl std::fmt::Display) -> Error {
    Error::Inference {
        reason: e.to_string(),
    }
}

impl ModelHandle for OnnxHandle {
    fn predict(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let shape = self.preprocess.shape(images.len());
        let data = self.preprocess.batch(images);
        let input = Tensor::from_array((shape, data)).map_err(inference_error)?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![input])
            .map_err(inference_error)?;
        let (output_shape, probabilities) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        let num_classes = output_shape
            .last()
            .and_then(|&n| usize::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| inference_error(format!("unexpected output shape {output_shape:?}")))?;

        if probabilities.len() != images.len() * num_classes {
            return Err(inference_error(format!(
                "expected {} x {num_classes} scores, got {}",
                images.len(),
                probabilities.len()
            )));
        }

        Ok(probabilities
            .chunks(num_classes)
            .map(<[f32]>::to_vec)
            .collect())
    }
}
