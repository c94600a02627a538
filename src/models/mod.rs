//! Model storage, caching and the inference engine seam.

mod cache;
mod engine;
mod onnx;
mod preprocess;
mod store;

pub use cache::{ModelCache, align_metadata};
pub use engine::{LoadedModel, ModelHandle, ModelLoader};
pub use onnx::OnnxLoader;
pub use preprocess::Preprocess;
pub use store::{ClassMetadata, ModelStore};
