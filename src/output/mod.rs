//! Response formatting.

mod formatter;
mod types;

pub use formatter::{ResultFormatter, class_links};
pub use types::{Links, Prediction, PredictionInfo, PredictionResponse};
