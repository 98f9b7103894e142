//! Query builder for fluent Cypher statement construction.

use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::CypherExecutor;

/// A builder for constructing and executing Cypher statements.
///
/// Parameter serialization failures are deferred: the builder keeps the first
/// one and returns it from whichever terminal method runs the statement.
///
/// # Example
///
/// ```ignore
/// let rows = Query::new(&executor, "MATCH (p:Protein {uniprot_id: $id}) RETURN p.organism AS organism")
///     .param("id", "P12345")
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, E: CypherExecutor + ?Sized> {
    executor: &'a E,
    cypher: String,
    params: Params,
    error: Option<AppError>,
}

impl<'a, E: CypherExecutor + ?Sized> Query<'a, E> {
    /// Creates a new query builder.
    pub fn new(executor: &'a E, cypher: &str) -> Self {
        Self {
            executor,
            cypher: cypher.to_string(),
            params: Params::new(),
            error: None,
        }
    }

    /// Adds a parameter, referenced in Cypher as `$name`.
    pub fn param<T: Serialize>(mut self, name: &str, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.params.insert(name.to_string(), json);
            }
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(AppError::Internal(format!(
                        "failed to serialize parameter '{}': {}",
                        name, e
                    )));
                }
            }
        }
        self
    }

    /// Executes the statement and returns a stream of rows.
    pub async fn execute(self) -> Result<RowStream<'a>, AppError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.executor
            .execute_cypher(&self.cypher, self.params)
            .await
    }

    /// Executes the statement and collects all rows.
    pub async fn fetch_all(self) -> Result<Vec<Row>, AppError> {
        self.execute().await?.try_collect().await
    }

    /// Executes the statement and returns the first row, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, AppError> {
        let mut stream = self.execute().await?;
        stream.next().await.transpose()
    }

    /// Executes the statement and decodes every row into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(self) -> Result<Vec<T>, AppError> {
        let rows = self.fetch_all().await?;
        rows.iter().map(Row::decode).collect()
    }

    /// Executes the statement without returning results.
    pub async fn run(self) -> Result<(), AppError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.executor.run_cypher(&self.cypher, self.params).await
    }
}

/// Extension trait providing `executor.query("...")`.
pub trait QueryExt: CypherExecutor {
    fn query(&self, cypher: &str) -> Query<'_, Self>
    where
        Self: Sized,
    {
        Query::new(self, cypher)
    }
}

impl<E: CypherExecutor> QueryExt for E {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde::Serializer;
    use serde_json::{json, Value as JsonValue};
    use std::sync::Arc;

    use crate::graph::mock::MockExecutor;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct DomainRow {
        id: String,
        name: Option<String>,
    }

    #[tokio::test]
    async fn test_query_passes_params() {
        let executor = MockExecutor::new();

        executor
            .query("MATCH (p:Protein {uniprot_id: $id}) RETURN p.organism AS organism LIMIT $limit")
            .param("id", "P12345")
            .param("limit", 10)
            .fetch_all()
            .await
            .unwrap();

        let call = executor.last_call().unwrap();
        assert_eq!(call.params["id"], json!("P12345"));
        assert_eq!(call.params["limit"], json!(10));
    }

    #[tokio::test]
    async fn test_query_run_records_statement() {
        let executor = MockExecutor::new();

        executor
            .query("MERGE (d:Domain {interpro_id: $id})")
            .param("id", "IPR000719")
            .run()
            .await
            .unwrap();

        let call = executor.last_call().unwrap();
        assert!(call.cypher.starts_with("MERGE (d:Domain"));
    }

    #[tokio::test]
    async fn test_query_deferred_param_error() {
        let executor = MockExecutor::new();

        let result = executor
            .query("RETURN $x AS x")
            .param("x", Unserializable)
            .run()
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_query_fetch_as_decodes_rows() {
        let executor = MockExecutor::new().on(
            "RETURN d.interpro_id AS id",
            vec![
                Row::from_pairs([("id", json!("IPR000001")), ("name", json!("Kringle"))]),
                Row::from_pairs([("id", json!("IPR000719")), ("name", JsonValue::Null)]),
            ],
        );

        let domains: Vec<DomainRow> = executor
            .query("MATCH (d:Domain) RETURN d.interpro_id AS id, d.name AS name")
            .fetch_as()
            .await
            .unwrap();

        assert_eq!(domains.len(), 2);
        assert_eq!(domains[1].name, None);
    }

    #[tokio::test]
    async fn test_query_through_shared_handle() {
        let executor: Arc<dyn CypherExecutor> = Arc::new(MockExecutor::new());
        let row = executor.query("RETURN 1 AS one").fetch_one().await.unwrap();
        assert!(row.is_none());
    }
}
