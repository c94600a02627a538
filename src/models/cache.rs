//! Single-slot cache of the resident model.
//!
//! At most one [`LoadedModel`] lives in the cache. The mutex is held for the
//! whole check, load and swap sequence, so concurrent cache misses load the
//! model once and the second caller sees the first caller's result.

use crate::config::{ConfigStore, FlatConfig};
use crate::error::{Error, Result};
use crate::models::engine::{LoadedModel, ModelLoader};
use crate::models::store::{ClassMetadata, ModelStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Owner of the resident model and the loader that builds it.
pub struct ModelCache {
    store: ModelStore,
    loader: Box<dyn ModelLoader>,
    resident: Mutex<Option<Arc<LoadedModel>>>,
}

impl ModelCache {
    /// Create an empty cache.
    pub fn new(store: ModelStore, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            store,
            loader,
            resident: Mutex::new(None),
        }
    }

    /// The models root this cache loads from.
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<LoadedModel>>> {
        self.resident.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The resident model, if any.
    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.slot().clone()
    }

    /// Drop the resident model. Requests already holding it keep their copy.
    pub fn evict(&self) {
        if let Some(model) = self.slot().take() {
            info!(
                "Released model {}/{}",
                model.timestamp, model.checkpoint
            );
        }
    }

    /// Make `(timestamp, checkpoint)` the resident model.
    ///
    /// Returns immediately when it already is. Otherwise validates the
    /// selection against the models root, releases the resident model, loads
    /// class names, class metadata and the saved training configuration, and
    /// builds the new model. The saved configuration is merged into `config`
    /// only once the model has been built. If any step fails the cache is
    /// left empty.
    pub fn ensure_loaded(
        &self,
        timestamp: &str,
        checkpoint: &str,
        config: &RwLock<ConfigStore>,
    ) -> Result<Arc<LoadedModel>> {
        let mut slot = self.slot();
        if let Some(model) = slot.as_ref()
            && model.matches(timestamp, checkpoint)
        {
            debug!("Model {timestamp}/{checkpoint} already loaded");
            return Ok(Arc::clone(model));
        }

        self.check_selection(timestamp, checkpoint)?;
        info!("Using TIMESTAMP={timestamp}");
        info!("Using CKPT_NAME={checkpoint}");

        if let Some(previous) = slot.take() {
            debug!(
                "Released model {}/{}",
                previous.timestamp, previous.checkpoint
            );
        }

        let class_names = self.store.class_names(timestamp)?;
        let class_metadata =
            align_metadata(self.store.class_metadata(timestamp)?, class_names.len());

        let saved = self.store.saved_config(timestamp)?;
        let candidate = config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .with_saved(&saved)
            .map_err(|source| Error::SavedConfigInvalid {
                timestamp: timestamp.to_string(),
                source,
            })?;
        let merged = candidate.flatten();

        let handle = self
            .loader
            .load(&self.store.checkpoint_path(timestamp, checkpoint), &merged)?;

        commit_saved(config, &saved, timestamp)?;

        let model = Arc::new(LoadedModel {
            timestamp: timestamp.to_string(),
            checkpoint: checkpoint.to_string(),
            handle,
            class_names,
            class_metadata,
            config: merged,
        });
        *slot = Some(Arc::clone(&model));

        info!(
            "Loaded model {timestamp}/{checkpoint} with {} classes",
            model.num_classes()
        );
        Ok(model)
    }

    fn check_selection(&self, timestamp: &str, checkpoint: &str) -> Result<()> {
        let timestamps = self.store.timestamps()?;
        if timestamps.is_empty() {
            return Err(Error::NoModelsAvailable {
                root: self.store.root().to_path_buf(),
            });
        }
        if !timestamps.iter().any(|t| t == timestamp) {
            return Err(Error::UnknownTimestamp {
                requested: timestamp.to_string(),
                available: timestamps,
            });
        }

        let checkpoints = self.store.checkpoints(timestamp)?;
        if checkpoints.is_empty() {
            return Err(Error::NoCheckpointsAvailable {
                timestamp: timestamp.to_string(),
            });
        }
        if !checkpoints.iter().any(|c| c == checkpoint) {
            return Err(Error::UnknownCheckpoint {
                requested: checkpoint.to_string(),
                available: checkpoints,
            });
        }
        Ok(())
    }
}

fn commit_saved(config: &RwLock<ConfigStore>, saved: &FlatConfig, timestamp: &str) -> Result<()> {
    config
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .merge_saved(saved)
        .map_err(|source| Error::SavedConfigInvalid {
            timestamp: timestamp.to_string(),
            source,
        })
}

/// Keep metadata only when it lines up with the class names.
///
/// A length mismatch discards the metadata wholesale in favour of empty
/// strings; rows are never zipped partially.
pub fn align_metadata(metadata: Option<Vec<ClassMetadata>>, num_classes: usize) -> Vec<ClassMetadata> {
    match metadata {
        Some(metadata) if metadata.len() == num_classes => metadata,
        Some(metadata) => {
            warn!(
                "Class metadata has {} rows but there are {num_classes} classes; \
                 leave a class's row empty or put '-' when it has no information. \
                 Serving without metadata until this is fixed",
                metadata.len()
            );
            vec![ClassMetadata::String(String::new()); num_classes]
        }
        None => vec![ClassMetadata::String(String::new()); num_classes],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::engine::ModelHandle;
    use image::DynamicImage;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UniformHandle(usize);

    impl ModelHandle for UniformHandle {
        #[allow(clippy::cast_precision_loss)]
        fn predict(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0 / self.0 as f32; self.0]; images.len()])
        }
    }

    #[derive(Clone, Default)]
    struct CountingLoader(Arc<AtomicUsize>);

    impl ModelLoader for CountingLoader {
        fn load(&self, checkpoint: &Path, _config: &FlatConfig) -> Result<Box<dyn ModelHandle>> {
            if checkpoint.ends_with("corrupt.onnx") {
                return Err(Error::CheckpointLoad {
                    path: checkpoint.to_path_buf(),
                    reason: "truncated file".to_string(),
                });
            }
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(UniformHandle(3)))
        }
    }

    fn write_run(store: &ModelStore, timestamp: &str, classes: &[&str], info: Option<&[&str]>) {
        let splits = store.splits_dir(timestamp);
        fs::create_dir_all(&splits).unwrap();
        fs::write(splits.join("classes.txt"), classes.join("\n")).unwrap();
        if let Some(info) = info {
            fs::write(splits.join("info.txt"), info.join("\n")).unwrap();
        }
        fs::create_dir_all(store.checkpoints_dir(timestamp)).unwrap();
        for ckpt in ["final_model.onnx", "corrupt.onnx"] {
            fs::write(store.checkpoint_path(timestamp, ckpt), b"onnx").unwrap();
        }
        let conf = store.conf_path(timestamp);
        fs::create_dir_all(conf.parent().unwrap()).unwrap();
        fs::write(conf, r#"{"model": {"image_size": 299}}"#).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, ModelCache, CountingLoader, RwLock<ConfigStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        write_run(&store, "2023-01-01", &["rose", "oak", "fern"], None);
        let loader = CountingLoader::default();
        let cache = ModelCache::new(store, Box::new(loader.clone()));
        let config = RwLock::new(ConfigStore::from_default_schema().unwrap());
        (dir, cache, loader, config)
    }

    #[test]
    fn test_second_load_is_a_cache_hit() {
        let (_dir, cache, loader, config) = fixture();
        let first = cache
            .ensure_loaded("2023-01-01", "final_model.onnx", &config)
            .unwrap();
        let second = cache
            .ensure_loaded("2023-01-01", "final_model.onnx", &config)
            .unwrap();

        assert_eq!(loader.0.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_load_merges_saved_config() {
        let (_dir, cache, _loader, config) = fixture();
        let model = cache
            .ensure_loaded("2023-01-01", "final_model.onnx", &config)
            .unwrap();

        assert_eq!(model.config.int("model", "image_size").unwrap(), 299);
        let active = config.read().unwrap().flatten();
        assert_eq!(active.int("model", "image_size").unwrap(), 299);
    }

    #[test]
    fn test_unknown_timestamp_lists_available() {
        let (_dir, cache, _loader, config) = fixture();
        let err = cache
            .ensure_loaded("api", "final_model.onnx", &config)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTimestamp { .. }));
        assert!(err.to_string().contains("2023-01-01"));
    }

    #[test]
    fn test_unknown_checkpoint_lists_available() {
        let (_dir, cache, _loader, config) = fixture();
        let err = cache
            .ensure_loaded("2023-01-01", "epoch-99.onnx", &config)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCheckpoint { .. }));
        assert!(err.to_string().contains("final_model.onnx"));
    }

    #[test]
    fn test_empty_root_has_no_models() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(
            ModelStore::new(dir.path()),
            Box::new(CountingLoader::default()),
        );
        let config = RwLock::new(ConfigStore::from_default_schema().unwrap());
        let err = cache
            .ensure_loaded("api", "final_model.onnx", &config)
            .unwrap_err();
        assert!(matches!(err, Error::NoModelsAvailable { .. }));
    }

    #[test]
    fn test_timestamp_without_checkpoints() {
        let (dir, cache, _loader, config) = fixture();
        fs::create_dir_all(dir.path().join("empty-run").join("ckpts")).unwrap();
        let err = cache
            .ensure_loaded("empty-run", "final_model.onnx", &config)
            .unwrap_err();
        assert!(matches!(err, Error::NoCheckpointsAvailable { .. }));
    }

    #[test]
    fn test_metadata_mismatch_falls_back_to_empty() {
        let (_dir, cache, _loader, config) = fixture();
        write_run(
            cache.store(),
            "2024-01-01",
            &["a", "b", "c", "d", "e"],
            Some(&["one", "two", "three"]),
        );
        let model = cache
            .ensure_loaded("2024-01-01", "final_model.onnx", &config)
            .unwrap();
        assert_eq!(model.class_metadata, vec![json!(""); 5]);
    }

    #[test]
    fn test_failed_load_leaves_cache_empty() {
        let (_dir, cache, loader, config) = fixture();
        cache
            .ensure_loaded("2023-01-01", "final_model.onnx", &config)
            .unwrap();
        let err = cache
            .ensure_loaded("2023-01-01", "corrupt.onnx", &config)
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::InternalLoad);
        assert!(cache.current().is_none());

        cache
            .ensure_loaded("2023-01-01", "final_model.onnx", &config)
            .unwrap();
        assert_eq!(loader.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_saved_config_is_not_merged() {
        let (_dir, cache, _loader, config) = fixture();
        fs::write(
            cache.store().conf_path("2023-01-01"),
            r#"{"training": {"batch_size": 0}}"#,
        )
        .unwrap();
        let err = cache
            .ensure_loaded("2023-01-01", "final_model.onnx", &config)
            .unwrap_err();
        assert!(matches!(err, Error::SavedConfigInvalid { .. }));
        let active = config.read().unwrap().flatten();
        assert_eq!(active.int("training", "batch_size").unwrap(), 16);
    }

    #[test]
    fn test_align_metadata_keeps_matching_rows() {
        let metadata = vec![json!("a"), json!({"k": 1})];
        assert_eq!(align_metadata(Some(metadata.clone()), 2), metadata);
        assert_eq!(align_metadata(None, 2), vec![json!(""), json!("")]);
    }

    #[test]
    fn test_evict_clears_resident_model() {
        let (_dir, cache, _loader, config) = fixture();
        let held = cache
            .ensure_loaded("2023-01-01", "final_model.onnx", &config)
            .unwrap();
        cache.evict();
        assert!(cache.current().is_none());
        assert_eq!(held.num_classes(), 3);
    }
}
