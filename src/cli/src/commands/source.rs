//! `imgscope source` command: classify an image string without acquiring it.

use std::sync::Arc;

use clap::Args;
use imgscope_core::{ScopeConfig, SourceKind};
use imgscope_runtime::{DockerCli, SourceDetector};

#[derive(Args)]
pub struct SourceArgs {
    /// Image string to classify
    pub image: String,
}

pub fn execute(args: SourceArgs, config: &ScopeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let detector = SourceDetector::new(Arc::new(DockerCli::from_config(config)));
    let (kind, locator) = detector.detect(&args.image)?;
    println!("{}", render(kind, &locator));
    Ok(())
}

fn render(kind: SourceKind, locator: &str) -> String {
    format!("{}\t{}", kind, locator)
}
