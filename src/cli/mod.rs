//! CLI argument parsing and command output.

mod args;
mod options;

pub use args::{Cli, Command, ConfigAction, GlobalArgs, PredictArgs, overrides_map};
pub use options::render_options;
