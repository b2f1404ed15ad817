//! CLI command definitions and dispatch.

mod inspect;
mod layers;
mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use imgscope_core::{ScopeConfig, TracingLogger};

/// imgscope: inspect container images from the docker daemon, tarballs and OCI layouts.
#[derive(Parser)]
#[command(name = "imgscope", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ~/.imgscope/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Display image metadata, configuration and layers as JSON
    Inspect(inspect::InspectArgs),
    /// Read an image and list its layers
    Layers(layers::LayersArgs),
    /// Show which source an image string resolves to
    Source(source::SourceArgs),
}

/// Load the configuration named on the command line, or the default one.
///
/// Environment overrides apply on top of the file either way.
pub(crate) fn load_config(path: Option<&Path>) -> imgscope_core::Result<ScopeConfig> {
    match path {
        Some(path) => {
            Ok(ScopeConfig::load(path)?.with_env_overrides(|key| std::env::var(key).ok()))
        }
        None => ScopeConfig::load_default(),
    }
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref())?;
    if !imgscope_runtime::init(config.clone()) {
        tracing::debug!("Default context already initialized");
    }
    imgscope_runtime::set_logger(Arc::new(TracingLogger));

    match cli.command {
        Command::Inspect(args) => inspect::execute(args),
        Command::Layers(args) => layers::execute(args),
        Command::Source(args) => source::execute(args, &config),
    }
}
