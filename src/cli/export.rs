//! Export subcommand.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use color_eyre::Result;

use crate::di::FromRef;
use crate::models::NeighborhoodExport;
use crate::services::NeighborhoodService;

/// Output shape of an exported neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// `{center, depth, nodes, edges}`
    Plain,
    /// Cytoscape.js element list
    Cytoscape,
}

/// Export the neighborhood of a protein as JSON.
#[derive(Parser)]
pub struct ExportCommand {
    /// UniProt accession of the center protein.
    pub id: String,

    /// Hops from the center (1 or 2; defaults to the configured depth).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub depth: Option<u8>,

    #[arg(long, value_enum, default_value = "plain")]
    pub format: ExportFormat,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ExportCommand {
    /// Exits with status 2 when the center protein does not exist.
    pub async fn run(self) -> Result<ExitCode> {
        let ctx = super::connect().await?;
        let export = NeighborhoodService::from_ref(&ctx)
            .export(&self.id, self.depth)
            .await?;

        let payload = match export {
            NeighborhoodExport::Found(payload) => payload,
            NeighborhoodExport::NotFound { center } => {
                eprintln!("Protein not found: {}", center);
                return Ok(ExitCode::from(2));
            }
        };

        let json = match self.format {
            ExportFormat::Plain => serde_json::to_string_pretty(&payload)?,
            ExportFormat::Cytoscape => serde_json::to_string_pretty(&payload.to_cytoscape())?,
        };

        match &self.output {
            Some(path) => {
                std::fs::write(path, json)?;
                tracing::info!(path = %path.display(), "Wrote neighborhood");
            }
            None => println!("{}", json),
        }
        Ok(ExitCode::SUCCESS)
    }
}
