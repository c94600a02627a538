//! Top-K prediction over a loaded model.

mod runner;
mod topk;

pub use runner::{InferenceRunner, RunOptions, RunOutput};
pub use topk::{TopK, average, select_top_k};
