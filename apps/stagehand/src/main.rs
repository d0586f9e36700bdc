//! Stagehand binary entry point.
//!
//! Parses the CLI, initializes logging, and maps the command outcome to
//! the process exit code (0 success/no-op, 1 platform failure, 2
//! configuration error).

use clap::Parser;
use stagehand::cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let code = Cli::parse().run().await;
    ExitCode::from(code)
}
