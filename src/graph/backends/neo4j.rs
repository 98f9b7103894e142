//! Neo4j backend over the neo4rs Bolt driver.
//!
//! # Example
//!
//! ```ignore
//! use protgraph::config::Neo4jConfig;
//! use protgraph::graph::backends::neo4j::Neo4jClient;
//! use protgraph::graph::QueryExt;
//!
//! let client = Neo4jClient::connect(&Neo4jConfig::default()).await?;
//! let rows = client
//!     .query("MATCH (p:Protein {uniprot_id: $id}) RETURN p.organism AS organism")
//!     .param("id", "P12345")
//!     .fetch_all()
//!     .await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    ConfigBuilder, Graph,
};
use serde_json::Value as JsonValue;

use crate::config::Neo4jConfig;
use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::CypherExecutor;

/// Neo4j graph client.
///
/// Wraps the neo4rs connection pool. Every store round-trip is bounded by the
/// configured deadline; expiry surfaces as [`AppError::Timeout`], which callers
/// treat as retryable. Pooled connections go back to the pool when the
/// returned stream is dropped, whether it was drained or not.
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Graph,
    timeout: Duration,
}

impl Neo4jClient {
    /// Connects to Neo4j and verifies the server answers.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, AppError> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .max_connections(config.max_connections);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder
            .build()
            .map_err(|e| AppError::Connection(format!("invalid Neo4j configuration: {}", e)))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| classify_error(e, "connect"))?;

        let client = Self {
            graph,
            timeout: Duration::from_secs(config.query_timeout_secs),
        };
        client.run_cypher("RETURN 1", Params::new()).await?;
        Ok(client)
    }

    async fn bounded<T, F>(&self, cypher: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, neo4rs::Error>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AppError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| classify_error(e, cypher))
    }
}

#[async_trait]
impl CypherExecutor for Neo4jClient {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let mut stream = self
            .bounded(cypher, self.graph.execute(build_query(cypher, params)))
            .await?;

        let timeout = self.timeout;
        let cypher = cypher.to_string();
        Ok(Box::pin(try_stream! {
            loop {
                let next = tokio::time::timeout(timeout, stream.next())
                    .await
                    .map_err(|_| AppError::Timeout { seconds: timeout.as_secs() })?
                    .map_err(|e| classify_error(e, &cypher))?;
                match next {
                    Some(row) => yield decode_row(&row)?,
                    None => break,
                }
            }
        }))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.bounded(cypher, self.graph.run(build_query(cypher, params)))
            .await
    }
}

fn build_query(cypher: &str, params: Params) -> neo4rs::Query {
    params
        .into_iter()
        .fold(neo4rs::query(cypher), |q, (name, value)| {
            q.param(&name, json_to_bolt(value))
        })
}

/// Converts a JSON parameter into the Bolt value the driver sends.
fn json_to_bolt(value: JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        JsonValue::String(s) => BoltType::String(BoltString::from(s)),
        JsonValue::Array(items) => BoltType::List(BoltList::from(
            items.into_iter().map(json_to_bolt).collect::<Vec<_>>(),
        )),
        JsonValue::Object(fields) => {
            let mut map = BoltMap::new();
            for (k, v) in fields {
                map.put(BoltString::from(k), json_to_bolt(v));
            }
            BoltType::Map(map)
        }
    }
}

fn decode_row(row: &neo4rs::Row) -> Result<Row, AppError> {
    row.to::<HashMap<String, JsonValue>>()
        .map(Row::new)
        .map_err(|e| AppError::Internal(format!("failed to decode Neo4j row: {}", e)))
}

/// Sorts driver errors into the crate's failure taxonomy.
///
/// Classification goes through the rendered error so that it keeps working
/// across driver versions that reshuffle their error enums.
fn classify_error(err: neo4rs::Error, cypher: &str) -> AppError {
    let detail = format!("{:?}", err);
    let message = err.to_string();

    if detail.contains("ConstraintValidationFailed") {
        AppError::ConstraintViolation(message)
    } else if detail.contains("IOError")
        || detail.contains("ConnectionError")
        || detail.contains("ServiceUnavailable")
        || detail.contains("SessionExpired")
    {
        AppError::Connection(message)
    } else {
        AppError::Query {
            message,
            query: cypher.to_string(),
        }
    }
}
