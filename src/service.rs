//! Request orchestration for prediction and training.
//!
//! A prediction folds the request overrides into the active configuration,
//! makes sure the selected checkpoint is resident, resolves and decodes the
//! inputs, scores them and formats the response. Temporary files of uploaded
//! inputs live in [`ResolvedInputs`](crate::input::ResolvedInputs) and are
//! removed when it goes out of scope, whichever step fails.

use crate::config::{ConfigStore, FlatConfig, OptionGroups, Settings};
use crate::constants::TIMESTAMP_FORMAT;
use crate::error::{Error, Result};
use crate::inference::{InferenceRunner, RunOptions};
use crate::input::{InputResolver, RemoteImages, UploadedFile, load_images};
use crate::models::{LoadedModel, ModelCache, ModelLoader, ModelStore, OnnxLoader};
use crate::output::{PredictionResponse, ResultFormatter};
use crate::storage::{RcloneSync, StorageSync, copy_or_warn};
use crate::training::{CommandTrainer, Trainer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Configuration overrides of one request: option key to JSON text.
pub type Overrides = BTreeMap<String, String>;

/// One prediction request. Exactly one of `urls` and `files` must be non-empty.
#[derive(Debug, Clone, Default)]
pub struct PredictRequest {
    /// Image URLs, remote or inline.
    pub urls: Vec<String>,
    /// Uploaded image files.
    pub files: Vec<UploadedFile>,
    /// Option overrides.
    pub overrides: Overrides,
}

/// Result of a training request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainOutcome {
    /// Timestamp of the new run.
    pub timestamp: String,
    /// Directory of the new run.
    pub run_dir: PathBuf,
}

/// The classification service: active configuration, resident model and
/// external collaborators.
pub struct ImageClassifier {
    config: Arc<RwLock<ConfigStore>>,
    cache: Arc<ModelCache>,
    resolver: InputResolver,
    trainer: Box<dyn Trainer>,
    sync: Box<dyn StorageSync>,
    settings: Settings,
}

impl ImageClassifier {
    /// Build the service from settings with the ONNX engine, the configured
    /// training command and `rclone` sync.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let loader = OnnxLoader::new(settings.inference.intra_threads);
        let trainer = CommandTrainer::from_config(&settings.training);
        let sync = RcloneSync::from_config(&settings.storage);
        Self::new(settings, Box::new(loader), Box::new(trainer), Box::new(sync))
    }

    /// Build the service with explicit collaborators.
    ///
    /// Points the default timestamp at an existing run and pulls the remote
    /// dataset folders when they are configured.
    pub fn new(
        settings: Settings,
        loader: Box<dyn ModelLoader>,
        trainer: Box<dyn Trainer>,
        sync: Box<dyn StorageSync>,
    ) -> Result<Self> {
        let store = ModelStore::new(&settings.paths.models_dir);
        let mut config = ConfigStore::from_default_schema()?;
        config.resolve_default_timestamp(&store.timestamps()?);

        let resolver = InputResolver::new(RemoteImages::new(&settings.http)?);
        let service = Self {
            config: Arc::new(RwLock::new(config)),
            cache: Arc::new(ModelCache::new(store, loader)),
            resolver,
            trainer,
            sync,
            settings,
        };
        service.pull_datasets();
        Ok(service)
    }

    fn pull_datasets(&self) {
        let storage = &self.settings.storage;
        let paths = &self.settings.paths;
        for (remote, local) in [
            (&storage.remote_splits, &paths.splits_dir),
            (&storage.remote_images, &paths.images_dir),
        ] {
            if let Some(remote) = remote {
                copy_or_warn(self.sync.as_ref(), remote, &local.to_string_lossy());
            }
        }
    }

    /// The model cache.
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Current option values with their schema.
    pub fn options(&self) -> OptionGroups {
        self.read_config().groups().clone()
    }

    /// The last published configuration.
    pub fn active_config(&self) -> Arc<FlatConfig> {
        self.read_config().flatten()
    }

    fn read_config(&self) -> std::sync::RwLockReadGuard<'_, ConfigStore> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply overrides and return the configuration they produced.
    fn apply_overrides(&self, overrides: &Overrides) -> Result<Arc<FlatConfig>> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.merge_query(overrides)?;
        Ok(config.flatten())
    }

    /// Make the selected checkpoint resident on the blocking pool.
    ///
    /// Loading reads artifacts and deserialises the network while holding the
    /// cache lock, which must not stall the async workers.
    async fn load_model(&self, timestamp: &str, checkpoint: &str) -> Result<Arc<LoadedModel>> {
        let cache = Arc::clone(&self.cache);
        let config = Arc::clone(&self.config);
        let (timestamp, checkpoint) = (timestamp.to_string(), checkpoint.to_string());

        tokio::task::spawn_blocking(move || cache.ensure_loaded(&timestamp, &checkpoint, &config))
            .await
            .map_err(|e| Error::Internal {
                message: format!("model loading task failed: {e}"),
            })?
    }

    /// Classify the images of a request.
    pub async fn predict(&self, request: PredictRequest) -> Result<PredictionResponse> {
        if request.urls.is_empty() == request.files.is_empty() {
            return Err(Error::AmbiguousQuery);
        }

        let snapshot = self.apply_overrides(&request.overrides)?;
        let options = run_options(&snapshot)?;
        let (timestamp, checkpoint) = snapshot.model_selection()?;

        let model = self.load_model(&timestamp, &checkpoint).await?;

        let inputs = if request.urls.is_empty() {
            self.resolver.resolve_files(&request.files)?
        } else {
            self.resolver.resolve_urls(&request.urls).await?
        };

        let images = load_images(&inputs, self.resolver.remote()).await?;
        let output = InferenceRunner::predict(&model, &images, options)?;
        let response = ResultFormatter::for_model(&model).format_output(&output)?;

        info!(
            "Predicted {} {:?} image(s) with {timestamp}/{checkpoint}",
            inputs.len(),
            inputs.mode()
        );
        Ok(response)
    }

    /// Train a new model into a fresh timestamped run.
    ///
    /// The resident model is released first. Pushing the models folder to
    /// remote storage afterwards is best effort.
    pub fn train(&self, overrides: &Overrides) -> Result<TrainOutcome> {
        let snapshot = self.apply_overrides(overrides)?;
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();

        self.cache.evict();
        let store = self.cache.store();
        let run_dir = store.create_run(&timestamp, &snapshot)?;
        self.trainer
            .train(&timestamp, &run_dir, &store.conf_path(&timestamp))?;

        if let Some(remote) = &self.settings.storage.remote_models {
            copy_or_warn(
                self.sync.as_ref(),
                &store.root().to_string_lossy(),
                remote,
            );
        }

        info!("Training run {timestamp} stored in {}", run_dir.display());
        Ok(TrainOutcome { timestamp, run_dir })
    }
}

fn run_options(config: &FlatConfig) -> Result<RunOptions> {
    let top_k = config.int("testing", "top_k")?;
    Ok(RunOptions {
        top_k: usize::try_from(top_k).map_err(|_| Error::Internal {
            message: format!("testing.top_k out of range: {top_k}"),
        })?,
        merge: config.bool("testing", "merge")?,
    })
}
