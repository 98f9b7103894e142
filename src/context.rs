//! Application context: the store handle and config every service is built from.

use std::sync::Arc;

use crate::config::Config;
use crate::di::Context as ContextDerive;
use crate::error::AppError;
use crate::graph::backends::neo4j::Neo4jClient;
use crate::graph::CypherExecutor;

/// Shared handle to the graph store used by every repository.
pub type AppGraph = Arc<dyn CypherExecutor>;

/// Shared dependencies of one CLI run. Each field resolves through `FromRef`.
#[derive(ContextDerive, Clone)]
pub struct Context {
    /// Graph store handle.
    pub graph: AppGraph,
    /// Application configuration.
    pub config: Arc<Config>,
}

impl Context {
    /// Creates a new context with the given dependencies.
    pub fn new(graph: AppGraph, config: Config) -> Self {
        Self {
            graph,
            config: Arc::new(config),
        }
    }

    /// Connects to the configured Neo4j server and builds the context.
    pub async fn connect(config: Config) -> Result<Self, AppError> {
        tracing::info!(uri = %config.neo4j.uri, "Connecting to Neo4j");
        let client = Neo4jClient::connect(&config.neo4j).await?;
        tracing::info!("Connected to Neo4j");
        Ok(Self::new(Arc::new(client), config))
    }
}
