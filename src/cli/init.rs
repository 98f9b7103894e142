//! Init command handler.

use color_eyre::Result;

use crate::migrations::run_migrations;

use super::App;

impl App {
    /// Run the init command to initialize the database schema.
    pub async fn run_init(&self) -> Result<()> {
        let ctx = super::connect().await?;

        tracing::info!("Running migrations...");
        let result = run_migrations(ctx.graph.as_ref()).await?;

        if result.applied_migrations.is_empty() {
            tracing::info!(
                "Database already at version {}, no migrations needed",
                result.current_version
            );
        } else {
            tracing::info!(
                "Migrations complete: v{} -> v{}, applied: {:?}",
                result.previous_version,
                result.current_version,
                result.applied_migrations
            );
        }

        Ok(())
    }
}
