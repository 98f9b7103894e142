//! CLI module for Protgraph.
//!
//! Subcommands:
//! - `init`: Initialize the database schema
//! - `import`: Load proteins and domain memberships from a JSON-lines file
//! - `rebuild`: Recompute the SIMILAR relation
//! - `export`: Write the neighborhood of one protein for visualization
//! - `pairs`: List the most similar protein pairs

mod export;
mod import;
mod init;
mod pairs;
mod rebuild;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use crate::config::Config;
use crate::context::Context;

pub use export::{ExportCommand, ExportFormat};
pub use import::ImportCommand;
pub use pairs::PairsCommand;
pub use rebuild::RebuildCommand;

/// Protgraph - protein domain-similarity graph
#[derive(Parser)]
#[command(name = "protgraph")]
#[command(about = "Protein domain-similarity graph over Neo4j")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize the database schema
    Init,

    /// Import proteins from a JSON-lines file
    Import(ImportCommand),

    /// Rebuild the SIMILAR relation
    Rebuild(RebuildCommand),

    /// Export the neighborhood of a protein
    Export(ExportCommand),

    /// List the highest-weight protein pairs
    Pairs(PairsCommand),
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> Result<ExitCode> {
        match self.command {
            Command::Init => self.run_init().await.map(|_| ExitCode::SUCCESS),
            Command::Import(cmd) => cmd.run().await.map(|_| ExitCode::SUCCESS),
            Command::Rebuild(cmd) => cmd.run().await.map(|_| ExitCode::SUCCESS),
            Command::Export(cmd) => cmd.run().await,
            Command::Pairs(cmd) => cmd.run().await.map(|_| ExitCode::SUCCESS),
        }
    }
}

/// Loads and validates configuration, then connects to the store.
async fn connect() -> Result<Context> {
    let config = Config::load()?;
    config.validate()?;
    Ok(Context::connect(config).await?)
}

/// Prints a serializable report as pretty JSON on stdout.
fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
