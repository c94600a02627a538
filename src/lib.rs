//! Imgclas - image classification serving.
//!
//! This crate selects a trained checkpoint, validates request inputs and
//! returns top-K class predictions from ONNX image classifiers.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod inference;
pub mod input;
pub mod metadata;
pub mod models;
pub mod output;
pub mod service;
pub mod storage;
pub mod training;

use clap::Parser;
use cli::{Cli, Command, ConfigAction, GlobalArgs, PredictArgs, overrides_map};
use config::{ConfigStore, Settings, resolve_settings_path};
use input::UploadedFile;
use models::ModelStore;
use serde::Serialize;
use service::{ImageClassifier, PredictRequest};
use std::collections::BTreeMap;

pub use error::{Error, ErrorKind, Result};

/// Main entry point for the imgclas CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet);

    match cli.command {
        Command::Predict(args) => predict(&cli.global, args),
        Command::Train { overrides } => train(&cli.global, overrides),
        Command::Options { group } => options(&cli.global, group.as_deref()),
        Command::Models => list_models(&cli.global),
        Command::Metadata => print_json(&metadata::get_metadata()),
        Command::Config { action } => handle_config_command(&cli.global, action),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // ORT is noisy at info level; -v lets its warnings through.
    let filter_str = if quiet {
        "warn,ort=off".to_string()
    } else {
        match verbose {
            0 => "info,ort=off".to_string(),
            1 => "debug,ort=warn".to_string(),
            2 => "trace,ort=info".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Settings from `--settings` or the platform path, with CLI overrides applied.
fn load_settings(global: &GlobalArgs) -> Result<Settings> {
    let mut settings = config::load_settings(global.settings.as_deref())?;
    if let Some(models_dir) = &global.models_dir {
        settings.paths.models_dir.clone_from(models_dir);
    }
    Ok(settings)
}

#[allow(clippy::print_stdout)]
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| Error::ResponseSerialize { source: e })?;
    println!("{json}");
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create async runtime: {e}"),
    })
}

fn predict(global: &GlobalArgs, args: PredictArgs) -> Result<()> {
    let service = ImageClassifier::from_settings(load_settings(global)?)?;

    let files = args
        .files
        .iter()
        .map(|path| UploadedFile::from_path(path))
        .collect::<Result<Vec<_>>>()?;
    let request = PredictRequest {
        urls: args.urls,
        files,
        overrides: overrides_map(args.overrides),
    };

    let response = runtime()?.block_on(service.predict(request))?;
    print_json(&response)
}

#[derive(Serialize)]
struct TrainResponse {
    status: &'static str,
    timestamp: String,
    run_dir: String,
}

fn train(global: &GlobalArgs, overrides: Vec<(String, String)>) -> Result<()> {
    let service = ImageClassifier::from_settings(load_settings(global)?)?;
    let outcome = service.train(&overrides_map(overrides))?;
    print_json(&TrainResponse {
        status: "ok",
        timestamp: outcome.timestamp,
        run_dir: outcome.run_dir.display().to_string(),
    })
}

#[allow(clippy::print_stdout)]
fn options(global: &GlobalArgs, group: Option<&str>) -> Result<()> {
    let settings = load_settings(global)?;
    let store = ModelStore::new(&settings.paths.models_dir);
    let mut config = ConfigStore::from_default_schema()?;
    config.resolve_default_timestamp(&store.timestamps()?);

    print!("{}", cli::render_options(config.groups(), group)?);
    Ok(())
}

fn list_models(global: &GlobalArgs) -> Result<()> {
    let settings = load_settings(global)?;
    let store = ModelStore::new(&settings.paths.models_dir);

    let mut runs = BTreeMap::new();
    for timestamp in store.timestamps()? {
        let checkpoints = store.checkpoints(&timestamp)?;
        runs.insert(timestamp, checkpoints);
    }
    print_json(&runs)
}

#[allow(clippy::print_stdout)]
fn handle_config_command(global: &GlobalArgs, action: ConfigAction) -> Result<()> {
    let path = resolve_settings_path(global.settings.as_deref())?;

    match action {
        ConfigAction::Init => {
            if path.exists() {
                println!("Settings file already exists: {}", path.display());
            } else {
                config::save_settings(&Settings::default(), &path)?;
                println!("Created settings file: {}", path.display());
            }
            Ok(())
        }
        ConfigAction::Show => {
            let settings = load_settings(global)?;
            let contents = toml::to_string_pretty(&settings)
                .map_err(|e| Error::SettingsSerialize { source: e })?;
            print!("{contents}");
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}
