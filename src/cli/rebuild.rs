//! Rebuild subcommand.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;

use crate::config::{RebuildMode, SimilarityBackend};
use crate::di::FromRef;
use crate::services::{RebuildOptions, RebuildService};
use crate::source::{JsonLinesSource, RecordSource};

/// Recompute the SIMILAR relation, optionally importing first.
#[derive(Parser)]
pub struct RebuildCommand {
    /// Import this JSON-lines file before recomputing.
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// How stale edges are replaced (defaults to the configured mode).
    #[arg(long, value_enum)]
    pub mode: Option<RebuildMode>,

    /// Similarity engine (defaults to the configured engine).
    #[arg(long, value_enum)]
    pub engine: Option<SimilarityBackend>,
}

impl RebuildCommand {
    pub async fn run(self) -> Result<()> {
        let ctx = super::connect().await?;
        let source = self.source.map(JsonLinesSource::new);

        let report = RebuildService::from_ref(&ctx)
            .rebuild(RebuildOptions {
                source: source.as_ref().map(|s| s as &dyn RecordSource),
                mode: self.mode,
                engine: self.engine,
            })
            .await?;
        super::print_json(&report)
    }
}
