//! Schema migrations for Neo4j with version tracking.
//!
//! Migrations are:
//! - **Idempotent**: Use `IF NOT EXISTS` and `MERGE`, required for safe retries
//! - **Additive-only**: Never delete properties, nodes, relationships, or constraints
//! - **Forward-only**: No rollback support - create compensating migrations if needed
//! - **Version-tracked**: Schema version stored on a `:SchemaVersion` node
//! - **Auto-applied**: Migrations run on `init` and before every rebuild

mod m001_constraints;
mod m002_similarity_generation;
mod runner;
mod traits;

pub use m001_constraints::M001Constraints;
pub use m002_similarity_generation::M002SimilarityGeneration;
pub use runner::{run_migrations, MigrationResult};
pub use traits::{Migration, Register};

/// All migrations in version order.
pub fn create_register() -> Register {
    Register::new()
        .register(M001Constraints)
        .register(M002SimilarityGeneration)
}
