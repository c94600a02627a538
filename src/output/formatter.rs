//! Maps raw top-K results to the public response shape.

use crate::constants::links;
use crate::error::{Error, Result};
use crate::inference::{RunOutput, TopK};
use crate::models::{ClassMetadata, LoadedModel};
use crate::output::types::{Links, Prediction, PredictionInfo, PredictionResponse};
use reqwest::Url;

/// Builds responses from class indices and probabilities.
#[derive(Debug, Clone, Copy)]
pub struct ResultFormatter<'a> {
    class_names: &'a [String],
    class_metadata: &'a [ClassMetadata],
}

impl<'a> ResultFormatter<'a> {
    /// Formatter over explicit class tables.
    pub fn new(class_names: &'a [String], class_metadata: &'a [ClassMetadata]) -> Self {
        Self {
            class_names,
            class_metadata,
        }
    }

    /// Formatter over the classes of `model`.
    pub fn for_model(model: &'a LoadedModel) -> Self {
        Self::new(&model.class_names, &model.class_metadata)
    }

    /// Format parallel label and probability sequences, keeping their order.
    pub fn format(&self, labels: &[usize], probabilities: &[f32]) -> Result<PredictionResponse> {
        let predictions = labels
            .iter()
            .zip(probabilities)
            .map(|(&label_id, &probability)| self.prediction(label_id, probability, None))
            .collect::<Result<Vec<_>>>()?;
        Ok(PredictionResponse::ok(predictions))
    }

    /// Format runner output. Unmerged groups are flattened in image order and
    /// tagged with their image index.
    pub fn format_output(&self, output: &RunOutput) -> Result<PredictionResponse> {
        match output {
            RunOutput::Single(top) => self.format(&top.label_ids, &top.probabilities),
            RunOutput::PerImage(groups) => {
                let mut predictions = Vec::new();
                for (image, top) in groups.iter().enumerate() {
                    predictions.extend(self.group(top, image)?);
                }
                Ok(PredictionResponse::ok(predictions))
            }
        }
    }

    fn group(&self, top: &TopK, image: usize) -> Result<Vec<Prediction>> {
        top.pairs()
            .map(|(label_id, probability)| self.prediction(label_id, probability, Some(image)))
            .collect()
    }

    fn prediction(
        &self,
        label_id: usize,
        probability: f32,
        image: Option<usize>,
    ) -> Result<Prediction> {
        let label = self
            .class_names
            .get(label_id)
            .ok_or_else(|| Error::Internal {
                message: format!(
                    "label id {label_id} out of range for {} classes",
                    self.class_names.len()
                ),
            })?;
        let metadata = self
            .class_metadata
            .get(label_id)
            .cloned()
            .unwrap_or_else(|| ClassMetadata::String(String::new()));

        Ok(Prediction {
            label_id,
            label: label.clone(),
            probability,
            info: PredictionInfo {
                links: class_links(label)?,
                metadata,
            },
            image,
        })
    }
}

/// Image search and encyclopedia links for a class name.
pub fn class_links(name: &str) -> Result<Links> {
    let link_err = |e: String| Error::Internal {
        message: format!("failed to build link for '{name}': {e}"),
    };

    let google_images =
        Url::parse_with_params(links::GOOGLE_IMAGES, &[("tbm", "isch"), ("q", name)])
            .map_err(|e| link_err(e.to_string()))?;

    let mut wikipedia = Url::parse(links::WIKIPEDIA).map_err(|e| link_err(e.to_string()))?;
    wikipedia
        .path_segments_mut()
        .map_err(|()| link_err("base URL cannot have a path".to_string()))?
        .pop_if_empty()
        .push(&name.replace(' ', "_"));

    Ok(Links {
        google_images: google_images.into(),
        wikipedia: wikipedia.into(),
    })
}
