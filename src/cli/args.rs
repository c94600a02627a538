//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Image classification with ONNX checkpoints.
#[derive(Debug, Parser)]
#[command(name = "imgclas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Models root directory (overrides settings).
    #[arg(long, global = true, env = "IMGCLAS_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Settings file (default: platform config directory).
    #[arg(long, global = true, env = "IMGCLAS_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace+ORT info, -vvv: trace+ORT debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify images given by URL or file.
    Predict(PredictArgs),
    /// Train a new model into a timestamped run.
    Train {
        /// Option overrides as KEY=JSON (e.g. --set epochs=5).
        #[arg(long = "set", value_name = "KEY=JSON", value_parser = parse_override)]
        overrides: Vec<(String, String)>,
    },
    /// List the model options with their types and current values.
    Options {
        /// Only show one option group.
        #[arg(short, long)]
        group: Option<String>,
    },
    /// List available timestamps and their checkpoints.
    Models,
    /// Print package and container metadata.
    Metadata,
    /// Manage the settings file.
    Config {
        /// Settings action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for the predict command.
#[derive(Debug, Args)]
#[command(group(
    clap::ArgGroup::new("input")
        .required(true)
        .multiple(false)
        .args(["urls", "files"])
))]
pub struct PredictArgs {
    /// Image URL; `data:image/...;base64,` URLs are accepted. Repeatable.
    #[arg(short, long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Image file (png or jpeg). Repeatable.
    #[arg(short, long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Option overrides as KEY=JSON (e.g. --set top_k=3 --set merge=false).
    #[arg(long = "set", value_name = "KEY=JSON", value_parser = parse_override)]
    pub overrides: Vec<(String, String)>,
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default settings file.
    Init,
    /// Display current settings.
    Show,
    /// Print settings file path.
    Path,
}

/// Parse a `KEY=JSON` override. The value is kept as JSON text.
fn parse_override(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{s}' is not KEY=JSON"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("'{s}' has an empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Collect override pairs, later values winning.
pub fn overrides_map(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}
