//! Migration runner with version tracking.
//!
//! The applied version lives on a single `(:SchemaVersion {id: 1})` node.

use chrono::Utc;

use crate::error::AppError;
use crate::graph::{CypherExecutor, Query};
use crate::migrations::{create_register, Migration};

/// Result of running migrations.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Schema version before migrations ran.
    pub previous_version: u32,
    /// Schema version after migrations ran.
    pub current_version: u32,
    /// List of migration IDs that were applied.
    pub applied_migrations: Vec<String>,
}

/// Run all pending migrations.
///
/// Migrations with a version above the stored one are applied in order and
/// the stored version is bumped after each one succeeds, so a failure leaves
/// the version at the last completed migration.
pub async fn run_migrations(graph: &dyn CypherExecutor) -> Result<MigrationResult, AppError> {
    let previous_version = get_schema_version(graph).await?;
    let register = create_register();

    let mut applied = vec![];
    let mut current_version = previous_version;

    for migration in register.iter() {
        if migration.version() <= current_version {
            continue;
        }

        tracing::info!(
            "Applying migration {} (v{}): {}",
            migration.id(),
            migration.version(),
            migration.description()
        );

        if let Err(e) = migration.up(graph).await {
            tracing::error!("Migration {} failed: {}", migration.id(), e);
            return Err(e);
        }

        update_schema_version(graph, migration).await?;
        current_version = migration.version();
        applied.push(migration.id().to_string());
    }

    Ok(MigrationResult {
        previous_version,
        current_version,
        applied_migrations: applied,
    })
}

/// Returns 0 if no version has been recorded (fresh database).
async fn get_schema_version(graph: &dyn CypherExecutor) -> Result<u32, AppError> {
    let row = Query::new(graph, "MATCH (v:SchemaVersion {id: 1}) RETURN v.version AS version")
        .fetch_one()
        .await?;

    match row {
        Some(row) => Ok(row.get_opt::<u32>("version")?.unwrap_or(0)),
        None => Ok(0),
    }
}

async fn update_schema_version(
    graph: &dyn CypherExecutor,
    migration: &dyn Migration,
) -> Result<(), AppError> {
    Query::new(
        graph,
        "MERGE (v:SchemaVersion {id: 1})
         SET v.version = $version,
             v.applied_migrations = coalesce(v.applied_migrations, []) + $id,
             v.last_applied_at = $now",
    )
    .param("version", migration.version())
    .param("id", migration.id())
    .param("now", Utc::now().to_rfc3339())
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::graph::mock::MockExecutor;
    use crate::graph::Row;

    #[tokio::test]
    async fn test_fresh_database_applies_everything() {
        let graph = MockExecutor::new();

        let result = run_migrations(&graph).await.unwrap();

        assert_eq!(result.previous_version, 0);
        assert_eq!(result.current_version, 2);
        assert_eq!(
            result.applied_migrations,
            vec!["m001_constraints", "m002_similarity_generation"]
        );
        assert_eq!(graph.calls_matching("CREATE CONSTRAINT").len(), 3);

        let bumps = graph.calls_matching("MERGE (v:SchemaVersion");
        assert_eq!(bumps.len(), 2);
        assert_eq!(bumps[1].params["version"], json!(2));

        // legacy edges are stamped into the generation the pointer starts at
        let stamp = &graph.calls_matching("WHERE r.generation IS NULL")[0];
        let pointer = &graph.calls_matching("ON CREATE SET g.current")[0];
        assert_eq!(stamp.params["generation"], json!(1));
        assert_eq!(pointer.params["generation"], json!(1));
    }

    #[tokio::test]
    async fn test_up_to_date_database_is_untouched() {
        let graph = MockExecutor::new().on(
            "RETURN v.version AS version",
            vec![Row::from_pairs([("version", json!(2))])],
        );

        let result = run_migrations(&graph).await.unwrap();

        assert_eq!(result.previous_version, 2);
        assert!(result.applied_migrations.is_empty());
        assert!(graph.calls_matching("CREATE").is_empty());
    }

    #[tokio::test]
    async fn test_failure_stops_before_version_bump() {
        let graph = MockExecutor::new()
            .on(
                "RETURN v.version AS version",
                vec![Row::from_pairs([("version", json!(1))])],
            )
            .on_with("similarity_generation_relation", |_| {
                Err(AppError::Connection("connection reset".into()))
            });

        let result = run_migrations(&graph).await;

        assert!(matches!(result, Err(AppError::Connection(_))));
        assert!(graph.calls_matching("MERGE (v:SchemaVersion").is_empty());
    }
}
