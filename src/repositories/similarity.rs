//! Similarity repository: generation-stamped SIMILAR edges.
//!
//! Every SIMILAR edge carries a `generation`. Readers only see the generation
//! the `(:SimilarityGeneration {relation: 'SIMILAR'})` pointer names. An edge
//! without the property is an unfinished write (GDS writes weights only) and
//! matches no reader until it is stamped.

use chrono::Utc;
use serde::Serialize;

use crate::context::AppGraph;
use crate::cypher;
use crate::di::FromContext;
use crate::error::AppError;
use crate::graph::QueryExt;
use crate::models::{SimilarityEdge, SIMILAR};
use crate::similarity::{EnrichedEdge, PendingEnrichment};

/// Which SIMILAR edges a batched delete removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationScope {
    All,
    NewerThan(i64),
    OlderThan(i64),
}

impl GenerationScope {
    fn predicate(&self) -> &'static str {
        match self {
            Self::All => "true",
            Self::NewerThan(_) => "(r.generation IS NULL OR r.generation > $generation)",
            Self::OlderThan(_) => "r.generation < $generation",
        }
    }

    fn generation(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::NewerThan(g) | Self::OlderThan(g) => Some(*g),
        }
    }
}

/// Parameters of a GDS nodeSimilarity write.
#[derive(Debug, Clone)]
pub struct GdsSimilarityParams<'a> {
    pub graph_name: &'a str,
    pub cutoff: f64,
    pub top_k: u32,
    pub concurrency: u32,
}

#[derive(Debug, Serialize)]
struct EdgeRow<'a> {
    source: &'a str,
    target: &'a str,
    jaccard_weight: f64,
    shared_domains: Option<u32>,
    union_domains: Option<u32>,
}

/// Repository for the SIMILAR relation and its generation pointer.
#[derive(FromContext, Clone)]
pub struct SimilarityRepository {
    graph: AppGraph,
}

impl SimilarityRepository {
    // ========================================================================
    // Generation pointer
    // ========================================================================

    /// The generation readers currently see. 0 before the schema is
    /// initialized, which matches no edge.
    pub async fn current_generation(&self) -> Result<i64, AppError> {
        let row = self
            .graph
            .query(
                "MATCH (g:SimilarityGeneration {relation: $relation})
                 RETURN g.current AS current",
            )
            .param("relation", SIMILAR)
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(row.get_opt::<i64>("current")?.unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Points readers at `generation`. A single-node write, so the switch is
    /// atomic for readers.
    pub async fn promote(&self, generation: i64) -> Result<(), AppError> {
        cypher!(
            self.graph,
            "MERGE (g:SimilarityGeneration {relation: $relation})
             SET g.current = $generation, g.promoted_at = $now",
            relation = SIMILAR,
            generation = generation,
            now = Utc::now().to_rfc3339(),
        )
        .run()
        .await
    }

    /// Gives edges without a generation property an explicit one.
    pub async fn stamp_unversioned(&self, generation: i64) -> Result<u64, AppError> {
        let row = self
            .graph
            .query(
                "MATCH ()-[r:SIMILAR]->()
                 WHERE r.generation IS NULL
                 SET r.generation = $generation
                 RETURN count(r) AS stamped",
            )
            .param("generation", generation)
            .fetch_one()
            .await?;
        count_column(row, "stamped")
    }

    // ========================================================================
    // Deletes
    // ========================================================================

    /// Deletes matching SIMILAR edges in bounded transactions until none are
    /// left. Returns the total deleted.
    pub async fn delete_batched(
        &self,
        scope: GenerationScope,
        batch_size: usize,
    ) -> Result<u64, AppError> {
        let cypher = format!(
            "MATCH ()-[r:SIMILAR]->()
             WHERE {}
             WITH r LIMIT $batch
             DELETE r
             RETURN count(r) AS deleted",
            scope.predicate()
        );

        let mut total = 0u64;
        loop {
            let mut query = self.graph.query(&cypher).param("batch", batch_size);
            if let Some(generation) = scope.generation() {
                query = query.param("generation", generation);
            }
            let deleted = count_column(query.fetch_one().await?, "deleted")?;
            total += deleted;
            tracing::debug!(deleted, total, ?scope, "Deleted SIMILAR batch");
            if deleted == 0 {
                return Ok(total);
            }
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Writes one batch of edges under `generation`. MERGE on the endpoints
    /// and generation makes a repeated batch a no-op.
    pub async fn write_edges(
        &self,
        edges: &[SimilarityEdge],
        generation: i64,
    ) -> Result<u64, AppError> {
        if edges.is_empty() {
            return Ok(0);
        }
        let rows: Vec<EdgeRow<'_>> = edges
            .iter()
            .map(|e| EdgeRow {
                source: &e.source,
                target: &e.target,
                jaccard_weight: e.jaccard_weight,
                shared_domains: e.shared_domains,
                union_domains: e.union_domains,
            })
            .collect();

        let row = self
            .graph
            .query(
                "UNWIND $edges AS e
                 MATCH (a:Protein {uniprot_id: e.source})
                 MATCH (b:Protein {uniprot_id: e.target})
                 MERGE (a)-[r:SIMILAR {generation: $generation}]->(b)
                 SET r.jaccard_weight = e.jaccard_weight,
                     r.shared_domains = e.shared_domains,
                     r.union_domains = e.union_domains
                 RETURN count(r) AS written",
            )
            .param("edges", &rows)
            .param("generation", generation)
            .fetch_one()
            .await?;
        count_column(row, "written")
    }

    // ========================================================================
    // Graph Data Science
    // ========================================================================

    /// Projects `(Protein)-[:HAS_DOMAIN]->(Domain)` into the GDS catalog,
    /// replacing any leftover projection of the same name.
    pub async fn gds_project(&self, graph_name: &str) -> Result<(), AppError> {
        self.gds_drop(graph_name).await?;
        self.graph
            .query(
                "CALL gds.graph.project($name, ['Protein', 'Domain'], 'HAS_DOMAIN')
                 YIELD graphName RETURN graphName",
            )
            .param("name", graph_name)
            .fetch_all()
            .await?;
        Ok(())
    }

    /// Runs `gds.nodeSimilarity.write`; the written edges carry only
    /// `jaccard_weight`. Returns the number of relationships written.
    pub async fn gds_write(&self, params: &GdsSimilarityParams<'_>) -> Result<u64, AppError> {
        let row = self
            .graph
            .query(
                "CALL gds.nodeSimilarity.write($name, {
                    writeRelationshipType: 'SIMILAR',
                    writeProperty: 'jaccard_weight',
                    similarityMetric: 'JACCARD',
                    similarityCutoff: $cutoff,
                    topK: $top_k,
                    concurrency: $concurrency
                 })
                 YIELD relationshipsWritten
                 RETURN relationshipsWritten AS written",
            )
            .param("name", params.graph_name)
            .param("cutoff", params.cutoff)
            .param("top_k", params.top_k)
            .param("concurrency", params.concurrency)
            .fetch_one()
            .await?;
        count_column(row, "written")
    }

    /// Drops the projection if it exists.
    pub async fn gds_drop(&self, graph_name: &str) -> Result<(), AppError> {
        self.graph
            .query("CALL gds.graph.drop($name, false) YIELD graphName RETURN graphName")
            .param("name", graph_name)
            .fetch_all()
            .await?;
        Ok(())
    }

    /// Removes the reverse edge wherever both directions of a pair exist in
    /// `generation`, keeping the one that starts at the smaller id.
    pub async fn collapse_reverse_duplicates(&self, generation: i64) -> Result<u64, AppError> {
        let row = self
            .graph
            .query(
                "MATCH (a:Protein)-[:SIMILAR {generation: $generation}]->(b:Protein)
                       -[r:SIMILAR {generation: $generation}]->(a)
                 WHERE a.uniprot_id < b.uniprot_id
                 WITH DISTINCT r
                 DELETE r
                 RETURN count(r) AS removed",
            )
            .param("generation", generation)
            .fetch_one()
            .await?;
        count_column(row, "removed")
    }

    // ========================================================================
    // Enrichment
    // ========================================================================

    /// Next page of edges in `generation` still lacking overlap counts.
    pub async fn pending_enrichment(
        &self,
        generation: i64,
        limit: usize,
    ) -> Result<Vec<PendingEnrichment>, AppError> {
        self.graph
            .query(
                "MATCH (a:Protein)-[r:SIMILAR {generation: $generation}]->(b:Protein)
                 WHERE r.shared_domains IS NULL AND r.enrichment_failed IS NULL
                 RETURN elementId(r) AS edge_id,
                        r.jaccard_weight AS jaccard_weight,
                        coalesce(a.domain_count, 0) AS count_a,
                        coalesce(b.domain_count, 0) AS count_b
                 LIMIT $limit",
            )
            .param("generation", generation)
            .param("limit", limit)
            .fetch_as()
            .await
    }

    /// Writes reconstructed counts back by relationship id.
    pub async fn write_enrichment(&self, edges: &[EnrichedEdge]) -> Result<u64, AppError> {
        if edges.is_empty() {
            return Ok(0);
        }
        let row = self
            .graph
            .query(
                "UNWIND $rows AS row
                 MATCH ()-[r:SIMILAR]->()
                 WHERE elementId(r) = row.edge_id
                 SET r.shared_domains = row.shared_domains,
                     r.union_domains = row.union_domains
                 RETURN count(r) AS enriched",
            )
            .param("rows", edges)
            .fetch_one()
            .await?;
        count_column(row, "enriched")
    }

    /// Flags edges whose stored weight could not be reconstructed so later
    /// pages skip them.
    pub async fn mark_enrichment_failed(&self, edge_ids: &[String]) -> Result<(), AppError> {
        if edge_ids.is_empty() {
            return Ok(());
        }
        self.graph
            .query(
                "UNWIND $ids AS id
                 MATCH ()-[r:SIMILAR]->()
                 WHERE elementId(r) = id
                 SET r.enrichment_failed = true",
            )
            .param("ids", edge_ids)
            .run()
            .await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Number of edges in `generation`.
    pub async fn count(&self, generation: i64) -> Result<u64, AppError> {
        let row = self
            .graph
            .query(
                "MATCH ()-[r:SIMILAR]->()
                 WHERE r.generation = $generation
                 RETURN count(r) AS total",
            )
            .param("generation", generation)
            .fetch_one()
            .await?;
        count_column(row, "total")
    }

    /// Highest-weight pairs of `generation`, each unordered pair once,
    /// weight descending then ids ascending.
    pub async fn top_pairs(
        &self,
        generation: i64,
        min_jaccard: f64,
        limit: usize,
    ) -> Result<Vec<SimilarityEdge>, AppError> {
        self.graph
            .query(
                "MATCH (a:Protein)-[r:SIMILAR]->(b:Protein)
                 WHERE r.generation = $generation
                   AND r.jaccard_weight >= $min_jaccard
                 WITH CASE WHEN a.uniprot_id < b.uniprot_id THEN a.uniprot_id ELSE b.uniprot_id END AS source,
                      CASE WHEN a.uniprot_id < b.uniprot_id THEN b.uniprot_id ELSE a.uniprot_id END AS target,
                      r
                 RETURN source, target,
                        max(r.jaccard_weight) AS jaccard_weight,
                        max(r.shared_domains) AS shared_domains,
                        max(r.union_domains) AS union_domains
                 ORDER BY jaccard_weight DESC, source, target
                 LIMIT $limit",
            )
            .param("generation", generation)
            .param("min_jaccard", min_jaccard)
            .param("limit", limit)
            .fetch_as()
            .await
    }
}

fn count_column(row: Option<crate::graph::Row>, column: &str) -> Result<u64, AppError> {
    match row {
        Some(row) => Ok(row.get_opt::<u64>(column)?.unwrap_or(0)),
        None => Ok(0),
    }
}
