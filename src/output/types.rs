//! Response types.

use crate::models::ClassMetadata;
use serde::{Deserialize, Serialize};

/// Successful prediction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Predictions in rank order, grouped by image when not merged.
    pub predictions: Vec<Prediction>,
}

impl PredictionResponse {
    /// Wrap predictions in the `ok` envelope.
    pub fn ok(predictions: Vec<Prediction>) -> Self {
        Self {
            status: "ok".to_string(),
            predictions,
        }
    }
}

/// One ranked class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class index.
    pub label_id: usize,
    /// Class name.
    pub label: String,
    /// Predicted probability.
    pub probability: f32,
    /// Links and metadata for the class.
    pub info: PredictionInfo,
    /// Index of the input image; only set for unmerged multi-image requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<usize>,
}

/// Extra information attached to a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInfo {
    /// External reference links.
    pub links: Links,
    /// Class metadata (string or record).
    pub metadata: ClassMetadata,
}

/// Search links for a class name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    /// Image search.
    #[serde(rename = "Google images")]
    pub google_images: String,
    /// Encyclopedia article.
    #[serde(rename = "Wikipedia")]
    pub wikipedia: String,
}
