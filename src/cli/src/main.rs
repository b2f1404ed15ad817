//! imgscope CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use imgscope_cli::commands::{dispatch, Cli};

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = dispatch(cli);
    // Scratch space is shared by every command; remove it before exiting.
    imgscope_runtime::cleanup_and_log();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
