//! Batched prediction over decoded images.

use crate::error::{Error, Result};
use crate::inference::topk::{TopK, average, select_top_k};
use crate::models::LoadedModel;
use image::DynamicImage;
use tracing::debug;

/// Prediction knobs of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Classes kept per result group.
    pub top_k: usize,
    /// Average all images into one result group.
    pub merge: bool,
}

/// Raw top-K results, squeezed when there is a single group.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    /// One result group: a single image or a merged batch.
    Single(TopK),
    /// One result group per image, in input order.
    PerImage(Vec<TopK>),
}

/// Drives the model over a request's images.
///
/// Batches run one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceRunner;

impl InferenceRunner {
    /// Score `images` with `model` and keep the top-K classes.
    pub fn predict(
        model: &LoadedModel,
        images: &[DynamicImage],
        options: RunOptions,
    ) -> Result<RunOutput> {
        if images.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let batch_size = model
            .config
            .int("training", "batch_size")
            .ok()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(images.len());

        let mut scores = Vec::with_capacity(images.len());
        for batch in images.chunks(batch_size) {
            let batch_scores = model.handle.predict(batch)?;
            if batch_scores.len() != batch.len() {
                return Err(Error::Inference {
                    reason: format!(
                        "model returned {} results for {} images",
                        batch_scores.len(),
                        batch.len()
                    ),
                });
            }
            scores.extend(batch_scores);
        }

        if let Some(bad) = scores.iter().find(|s| s.len() != model.num_classes()) {
            return Err(Error::Inference {
                reason: format!(
                    "model returned {} scores but there are {} classes",
                    bad.len(),
                    model.num_classes()
                ),
            });
        }
        debug!(
            "Scored {} image(s) in batches of {batch_size}",
            scores.len()
        );

        if options.merge || scores.len() == 1 {
            return Ok(RunOutput::Single(select_top_k(
                &average(&scores),
                options.top_k,
            )));
        }
        Ok(RunOutput::PerImage(
            scores
                .iter()
                .map(|s| select_top_k(s, options.top_k))
                .collect(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::models::ModelHandle;
    use image::RgbImage;
    use std::sync::{Arc, Mutex};

    /// Returns queued score vectors, recording batch sizes.
    struct Scripted {
        scores: Mutex<Vec<Vec<f32>>>,
        batches: Arc<Mutex<Vec<usize>>>,
    }

    impl ModelHandle for Scripted {
        fn predict(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(images.len());
            let mut scores = self.scores.lock().unwrap();
            Ok(scores.drain(..images.len()).collect())
        }
    }

    fn model(scores: Vec<Vec<f32>>, batch_size: i64) -> LoadedModel {
        model_with_batches(scores, batch_size, Arc::default())
    }

    fn model_with_batches(
        scores: Vec<Vec<f32>>,
        batch_size: i64,
        batches: Arc<Mutex<Vec<usize>>>,
    ) -> LoadedModel {
        let mut config = ConfigStore::from_default_schema().unwrap();
        let args = [("batch_size".to_string(), batch_size.to_string())]
            .into_iter()
            .collect();
        config.merge_query(&args).unwrap();

        LoadedModel {
            timestamp: "api".to_string(),
            checkpoint: "final_model.onnx".to_string(),
            handle: Box::new(Scripted {
                scores: Mutex::new(scores),
                batches,
            }),
            class_names: vec!["rose".into(), "oak".into(), "fern".into(), "moss".into()],
            class_metadata: vec![serde_json::Value::String(String::new()); 4],
            config: config.flatten(),
        }
    }

    fn images(n: usize) -> Vec<DynamicImage> {
        vec![DynamicImage::ImageRgb8(RgbImage::new(2, 2)); n]
    }

    const OPTIONS: RunOptions = RunOptions {
        top_k: 3,
        merge: true,
    };

    #[test]
    fn test_single_image_is_squeezed() {
        let model = model(vec![vec![0.1, 0.2, 0.6, 0.1]], 16);
        let out = InferenceRunner::predict(&model, &images(1), OPTIONS).unwrap();
        let RunOutput::Single(top) = out else {
            panic!("expected a single group");
        };
        assert_eq!(top.label_ids, vec![2, 1, 0]);
    }

    #[test]
    fn test_merge_averages_before_truncation() {
        let model = model(vec![vec![0.7, 0.1, 0.1, 0.1], vec![0.1, 0.5, 0.3, 0.1]], 16);
        let out = InferenceRunner::predict(&model, &images(2), OPTIONS).unwrap();
        let RunOutput::Single(top) = out else {
            panic!("expected a merged group");
        };
        assert_eq!(top.label_ids, vec![0, 1, 2]);
        assert!((top.probabilities[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_without_merge_each_image_has_its_own_group() {
        let model = model(vec![vec![0.7, 0.1, 0.1, 0.1], vec![0.1, 0.5, 0.3, 0.1]], 16);
        let options = RunOptions {
            top_k: 2,
            merge: false,
        };
        let out = InferenceRunner::predict(&model, &images(2), options).unwrap();
        let RunOutput::PerImage(groups) = out else {
            panic!("expected one group per image");
        };
        assert_eq!(groups[0].label_ids, vec![0, 1]);
        assert_eq!(groups[1].label_ids, vec![1, 2]);
    }

    #[test]
    fn test_images_are_scored_in_configured_batches() {
        let batches: Arc<Mutex<Vec<usize>>> = Arc::default();
        let model = model_with_batches(vec![vec![0.25; 4]; 5], 2, Arc::clone(&batches));
        InferenceRunner::predict(&model, &images(5), OPTIONS).unwrap();
        assert_eq!(*batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[test]
    fn test_empty_inputs_fail() {
        let model = model(Vec::new(), 16);
        assert!(matches!(
            InferenceRunner::predict(&model, &[], OPTIONS),
            Err(Error::EmptyQuery)
        ));
    }

    #[test]
    fn test_wrong_vector_length_is_inference_error() {
        let model = model(vec![vec![0.5, 0.5]], 16);
        assert!(matches!(
            InferenceRunner::predict(&model, &images(1), OPTIONS),
            Err(Error::Inference { .. })
        ));
    }
}
