//! Core trait for graph store access.
//!
//! Every backend implements [`CypherExecutor`]. Each call is one auto-commit
//! transaction on the store, so a single `UNWIND ... MERGE` statement over a
//! bounded batch of rows is also a bounded write transaction.

use async_trait::async_trait;

use crate::error::AppError;
use crate::graph::row::{Params, RowStream};

/// Executes Cypher statements against a property-graph store.
///
/// Implementations must be shareable across tasks: the application holds a
/// single `Arc<dyn CypherExecutor>` and hands clones to every repository.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Executes a statement and returns a stream of result rows.
    ///
    /// Use this for statements with a `RETURN` clause.
    async fn execute_cypher(&self, cypher: &str, params: Params)
        -> Result<RowStream<'_>, AppError>;

    /// Executes a statement and discards its results.
    ///
    /// Use this for schema statements and writes (MERGE, SET, DELETE).
    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError>;
}

// Shared handles forward to the executor they wrap, so `Arc<dyn CypherExecutor>`
// gets the `QueryExt` builder methods too.
#[async_trait]
impl<T: CypherExecutor + ?Sized> CypherExecutor for std::sync::Arc<T> {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        (**self).execute_cypher(cypher, params).await
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        (**self).run_cypher(cypher, params).await
    }
}
