//! Import subcommand.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;

use crate::di::FromRef;
use crate::services::ImportService;
use crate::source::JsonLinesSource;

/// Import proteins and their domain memberships.
#[derive(Parser)]
pub struct ImportCommand {
    /// JSON-lines file with one protein record per line.
    pub file: PathBuf,
}

impl ImportCommand {
    pub async fn run(self) -> Result<()> {
        let ctx = super::connect().await?;
        let source = JsonLinesSource::new(self.file);

        let report = ImportService::from_ref(&ctx).import(&source).await?;
        super::print_json(&report)
    }
}
