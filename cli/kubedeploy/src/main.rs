//! kubedeploy - render a Deployment manifest and apply it to a cluster.
//!
//! Runs as one step of a CI pipeline. Pipeline metadata and cluster
//! credentials come from the environment; the step renders the manifest
//! template, then creates the Deployment or replaces it if it already
//! exists, and exits.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod client;
mod error;
mod output;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    if let Err(e) = cli.run() {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
