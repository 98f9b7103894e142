//! Macro for convenient Cypher statement construction.

/// Shorthand for `executor.query(...)` followed by one `.param(...)` per
/// named argument.
///
/// ```ignore
/// use protgraph::cypher;
///
/// let rows = cypher!(
///     graph,
///     "MATCH (p:Protein {uniprot_id: $id})-[:HAS_DOMAIN]->(d:Domain) RETURN d.interpro_id AS id",
///     id = protein_id,
/// )
/// .fetch_all()
/// .await?;
/// ```
#[macro_export]
macro_rules! cypher {
    // Statement without parameters
    ($graph:expr, $query:expr) => {
        $graph.query($query)
    };
    // Statement with parameters
    ($graph:expr, $query:expr, $($name:ident = $value:expr),+ $(,)?) => {
        $graph.query($query)$(.param(stringify!($name), $value))+
    };
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::graph::mock::MockExecutor;
    use crate::graph::query::QueryExt;

    #[tokio::test]
    async fn test_cypher_macro_names_params_after_idents() {
        let executor = MockExecutor::new();
        let relation = "SIMILAR";
        let generation = 3_i64;

        cypher!(
            executor,
            "MERGE (g:SimilarityGeneration {relation: $relation}) SET g.current = $generation",
            relation = relation,
            generation = generation,
        )
        .run()
        .await
        .unwrap();

        let call = executor.last_call().unwrap();
        assert_eq!(call.params["relation"], json!("SIMILAR"));
        assert_eq!(call.params["generation"], json!(3));
    }

    #[tokio::test]
    async fn test_cypher_macro_without_params() {
        let executor = MockExecutor::new();
        cypher!(executor, "MATCH (p:Protein) RETURN count(p) AS total")
            .fetch_all()
            .await
            .unwrap();
        assert!(executor.last_call().unwrap().params.is_empty());
    }
}
