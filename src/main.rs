//! Protgraph - protein domain-similarity graph

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use protgraph::cli::App;

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let app = App::parse();

    // Initialize logging (stderr, so stdout stays machine-readable)
    let level = if app.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    app.run().await
}
