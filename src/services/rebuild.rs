//! Full similarity rebuild.
//!
//! Order of operations:
//! 1. schema migrations (constraints, indexes, generation pointer)
//! 2. optional import of a record source
//! 3. clearing of stale SIMILAR edges, per [`RebuildMode`]
//! 4. `domain_count` recomputation from current memberships
//! 5. similarity computation, native or GDS
//! 6. edge writes under the next generation
//! 7. count enrichment of edges that arrived with a weight only
//! 8. promotion of the new generation (and, when staged, removal of the old)
//!
//! Every step overwrites its own output, so a failed run can be repeated
//! from the start.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{Config, RebuildMode, SimilarityBackend};
use crate::context::AppGraph;
use crate::di::FromContext;
use crate::error::AppError;
use crate::migrations::run_migrations;
use crate::repositories::{
    GdsSimilarityParams, GenerationScope, ProteinRepository, SimilarityRepository,
};
use crate::services::{ImportReport, ImportService};
use crate::similarity::{EdgeEnricher, SimilarityEngine, SimilarityStats};
use crate::source::RecordSource;

/// Per-run overrides of the configured rebuild settings.
#[derive(Default)]
pub struct RebuildOptions<'a> {
    /// Rows to import before computing similarity.
    pub source: Option<&'a dyn RecordSource>,
    pub mode: Option<RebuildMode>,
    pub engine: Option<SimilarityBackend>,
}

/// Outcome of a rebuild run.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: RebuildMode,
    pub engine: SimilarityBackend,
    pub import: Option<ImportReport>,
    /// Generation readers see after the run.
    pub generation: i64,
    pub stale_edges_deleted: u64,
    pub proteins_counted: u64,
    /// Engine counters; only the native engine reports them.
    pub stats: Option<SimilarityStats>,
    pub edges_written: u64,
    pub edges_enriched: u64,
    pub edges_unenriched: u64,
}

/// Service running the full rebuild sequence.
#[derive(FromContext, Clone)]
pub struct RebuildService {
    graph: AppGraph,
    proteins: ProteinRepository,
    similarity: SimilarityRepository,
    importer: ImportService,
    config: Arc<Config>,
    #[from_context(default)]
    enricher: EdgeEnricher,
}

impl RebuildService {
    pub async fn rebuild(&self, options: RebuildOptions<'_>) -> Result<RebuildReport, AppError> {
        self.config.validate()?;
        let started_at = Utc::now();
        let mode = options.mode.unwrap_or(self.config.rebuild.mode);
        let engine = options.engine.unwrap_or(self.config.similarity.engine);
        let engine_params = SimilarityEngine::new(&self.config.similarity)?;

        tracing::info!(?mode, ?engine, "Starting similarity rebuild");

        let migrations = run_migrations(self.graph.as_ref()).await?;
        if !migrations.applied_migrations.is_empty() {
            tracing::info!(
                version = migrations.current_version,
                applied = ?migrations.applied_migrations,
                "Applied migrations"
            );
        }

        let import = match options.source {
            Some(source) => Some(self.importer.import(source).await?),
            None => None,
        };

        let current = self.similarity.current_generation().await?;
        let next = current + 1;
        let stale_edges_deleted = self.clear(mode, current).await?;

        let proteins_counted = self.proteins.recompute_domain_counts().await?;
        tracing::info!(proteins = proteins_counted, "Recomputed domain counts");

        let (stats, edges_written) = match engine {
            SimilarityBackend::Native => {
                let (stats, written) = self.run_native(engine_params, next).await?;
                (Some(stats), written)
            }
            SimilarityBackend::Gds => (None, self.run_gds(next).await?),
        };

        let (edges_enriched, edges_unenriched) = self.enrich(next).await?;

        self.similarity.promote(next).await?;
        tracing::info!(generation = next, "Promoted similarity generation");

        let stale_edges_deleted = stale_edges_deleted
            + match mode {
                RebuildMode::Staged => {
                    self.similarity
                        .delete_batched(
                            GenerationScope::OlderThan(next),
                            self.config.rebuild.delete_batch_size,
                        )
                        .await?
                }
                RebuildMode::ClearFirst => 0,
            };

        let report = RebuildReport {
            started_at,
            finished_at: Utc::now(),
            mode,
            engine,
            import,
            generation: next,
            stale_edges_deleted,
            proteins_counted,
            stats,
            edges_written,
            edges_enriched,
            edges_unenriched,
        };
        tracing::info!(
            generation = report.generation,
            written = report.edges_written,
            enriched = report.edges_enriched,
            deleted = report.stale_edges_deleted,
            "Rebuild complete"
        );
        Ok(report)
    }

    /// Removes what must not survive into the new generation.
    ///
    /// `ClearFirst` deletes every SIMILAR edge up front, so readers see an
    /// empty relation until promotion. `Staged` only removes leftovers of
    /// abandoned runs (newer generations and unstamped GDS writes) and keeps
    /// the current generation readable.
    async fn clear(&self, mode: RebuildMode, current: i64) -> Result<u64, AppError> {
        let batch = self.config.rebuild.delete_batch_size;
        let deleted = match mode {
            RebuildMode::ClearFirst => {
                self.similarity
                    .delete_batched(GenerationScope::All, batch)
                    .await?
            }
            RebuildMode::Staged => {
                self.similarity
                    .delete_batched(GenerationScope::NewerThan(current), batch)
                    .await?
            }
        };
        tracing::info!(deleted, ?mode, "Cleared stale SIMILAR edges");
        Ok(deleted)
    }

    async fn run_native(
        &self,
        engine: SimilarityEngine,
        generation: i64,
    ) -> Result<(SimilarityStats, u64), AppError> {
        let index = self.proteins.load_domain_index().await?;
        tracing::info!(
            proteins = index.entity_count(),
            domains = index.domain_count_total(),
            memberships = index.membership_count(),
            "Computing similarity"
        );

        let run = tokio::task::spawn_blocking(move || engine.run(&index))
            .await
            .map_err(|e| AppError::Internal(format!("similarity task failed: {}", e)))?;

        let mut written = 0u64;
        for chunk in run.edges.chunks(self.config.rebuild.write_batch_size) {
            written += self.similarity.write_edges(chunk, generation).await?;
        }
        tracing::info!(
            edges = written,
            skipped_domains = run.stats.domains_skipped,
            sampled_domains = run.stats.domains_sampled,
            "Wrote SIMILAR edges"
        );
        Ok((run.stats, written))
    }

    async fn run_gds(&self, generation: i64) -> Result<u64, AppError> {
        let settings = &self.config.similarity;
        let params = GdsSimilarityParams {
            graph_name: &settings.gds_graph_name,
            cutoff: settings.threshold,
            top_k: settings.gds_top_k,
            concurrency: settings.gds_concurrency,
        };

        self.similarity.gds_project(params.graph_name).await?;
        let written = self.similarity.gds_write(&params).await;
        // The projection holds memory until dropped, success or not.
        let dropped = self.similarity.gds_drop(params.graph_name).await;
        let written = written?;
        dropped?;

        let stamped = self.similarity.stamp_unversioned(generation).await?;
        let collapsed = self.similarity.collapse_reverse_duplicates(generation).await?;
        tracing::info!(
            written,
            stamped,
            collapsed,
            "GDS nodeSimilarity wrote SIMILAR edges"
        );
        Ok(stamped.saturating_sub(collapsed))
    }

    /// Fills overlap counts of edges written without them.
    /// Returns `(enriched, rejected)`.
    async fn enrich(&self, generation: i64) -> Result<(u64, u64), AppError> {
        let page_size = self.config.rebuild.write_batch_size;
        let mut enriched = 0u64;
        let mut rejected = 0u64;

        loop {
            let pending = self
                .similarity
                .pending_enrichment(generation, page_size)
                .await?;
            if pending.is_empty() {
                break;
            }

            let batch = self.enricher.enrich(&pending);
            enriched += self.similarity.write_enrichment(&batch.enriched).await?;

            if !batch.rejected.is_empty() {
                for (edge_id, e) in &batch.rejected {
                    tracing::warn!(edge = %edge_id, "Cannot reconstruct counts: {}", e);
                }
                let ids: Vec<String> = batch.rejected.into_iter().map(|(id, _)| id).collect();
                rejected += ids.len() as u64;
                self.similarity.mark_enrichment_failed(&ids).await?;
            }
        }

        if enriched > 0 || rejected > 0 {
            tracing::info!(enriched, rejected, "Reconstructed overlap counts");
        }
        Ok((enriched, rejected))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;

    use super::*;
    use crate::context::Context;
    use crate::di::FromRef;
    use crate::graph::mock::MockExecutor;
    use crate::graph::Row;

    fn service(mock: MockExecutor, config: Config) -> (RebuildService, Arc<MockExecutor>) {
        let mock = Arc::new(mock);
        let ctx = Context::new(mock.clone(), config);
        (RebuildService::from_ref(&ctx), mock)
    }

    fn position(mock: &MockExecutor, needle: &str) -> usize {
        mock.calls()
            .iter()
            .position(|c| c.cypher.contains(needle))
            .unwrap_or_else(|| panic!("no call containing {:?}", needle))
    }

    fn memberships() -> Vec<Row> {
        [
            ("A", "d1"),
            ("A", "d2"),
            ("B", "d1"),
            ("B", "d2"),
            ("C", "d2"),
            ("C", "d3"),
        ]
        .iter()
        .map(|(p, d)| Row::from_pairs([("uniprot_id", json!(p)), ("interpro_id", json!(d))]))
        .collect()
    }

    fn native_graph() -> MockExecutor {
        MockExecutor::new()
            .on(
                "RETURN v.version AS version",
                vec![Row::from_pairs([("version", json!(2))])],
            )
            .on(
                "RETURN g.current AS current",
                vec![Row::from_pairs([("current", json!(4))])],
            )
            .on("OPTIONAL MATCH (p)-[:HAS_DOMAIN]->(d:Domain)", memberships())
            .on_with("MERGE (a)-[r:SIMILAR", |params| {
                let n = params["edges"].as_array().map(Vec::len).unwrap_or(0);
                Ok(vec![Row::from_pairs([("written", json!(n))])])
            })
    }

    #[tokio::test]
    async fn test_clear_first_sequence_order() {
        let (svc, mock) = service(native_graph(), Config::default());

        let report = svc.rebuild(RebuildOptions::default()).await.unwrap();

        let clear = position(&mock, "DELETE r");
        let counts = position(&mock, "SET p.domain_count");
        let load = position(&mock, "OPTIONAL MATCH (p)-[:HAS_DOMAIN]");
        let write = position(&mock, "MERGE (a)-[r:SIMILAR");
        let enrich = position(&mock, "r.shared_domains IS NULL");
        let promote = position(&mock, "SET g.current = $generation");
        assert!(clear < counts && counts < load && load < write);
        assert!(write < enrich && enrich < promote);

        assert_eq!(report.generation, 5);
        assert_eq!(report.mode, RebuildMode::ClearFirst);
        // A-B: 2/2, A-C and B-C: 1/3
        assert_eq!(report.edges_written, 3);
        let stats = report.stats.unwrap();
        assert_eq!(stats.edges_emitted, 3);

        let promote_call = &mock.calls()[promote];
        assert_eq!(promote_call.params["generation"], json!(5));
    }

    #[tokio::test]
    async fn test_edges_written_in_bounded_batches() {
        let mut config = Config::default();
        config.rebuild.write_batch_size = 2;
        let (svc, mock) = service(native_graph(), config);

        svc.rebuild(RebuildOptions::default()).await.unwrap();

        let writes = mock.calls_matching("MERGE (a)-[r:SIMILAR");
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|c| c.params["generation"] == json!(5)));
    }

    #[tokio::test]
    async fn test_threshold_applied_to_native_edges() {
        let mut config = Config::default();
        config.similarity.threshold = 0.5;
        let (svc, _) = service(native_graph(), config);

        let report = svc.rebuild(RebuildOptions::default()).await.unwrap();
        assert_eq!(report.edges_written, 1);
    }

    #[tokio::test]
    async fn test_staged_mode_keeps_current_until_promotion() {
        let (svc, mock) = service(native_graph(), Config::default());

        let report = svc
            .rebuild(RebuildOptions {
                mode: Some(RebuildMode::Staged),
                ..Default::default()
            })
            .await
            .unwrap();

        let deletes = mock.calls_matching("DELETE r");
        assert!(deletes[0]
            .cypher
            .contains("r.generation IS NULL OR r.generation > $generation"));
        assert_eq!(deletes[0].params["generation"], json!(4));
        // the live generation is never touched before promotion
        assert!(mock.calls_matching("RETURN count(r) AS stamped").is_empty());

        let promote = position(&mock, "SET g.current = $generation");
        let old = position(&mock, "WHERE r.generation < $generation");
        assert!(promote < old);
        assert_eq!(report.generation, 5);
    }

    #[tokio::test]
    async fn test_gds_engine_drops_projection_on_failure() {
        let mock = MockExecutor::new()
            .on(
                "RETURN v.version AS version",
                vec![Row::from_pairs([("version", json!(2))])],
            )
            .on_with("gds.nodeSimilarity.write", |_| {
                Err(AppError::Query {
                    message: "There is no procedure with the name `gds.nodeSimilarity.write`".into(),
                    query: "CALL".into(),
                })
            });
        let (svc, mock) = service(mock, Config::default());

        let result = svc
            .rebuild(RebuildOptions {
                engine: Some(SimilarityBackend::Gds),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(AppError::Query { .. })));
        // one drop before projecting, one after the failed write
        assert_eq!(mock.calls_matching("gds.graph.drop").len(), 2);
        assert!(mock.calls_matching("SET g.current = $generation").is_empty());
    }

    #[tokio::test]
    async fn test_gds_engine_enriches_weights() {
        let served = Arc::new(AtomicBool::new(false));
        let flag = served.clone();
        let mock = MockExecutor::new()
            .on(
                "RETURN v.version AS version",
                vec![Row::from_pairs([("version", json!(2))])],
            )
            .on(
                "RETURN relationshipsWritten",
                vec![Row::from_pairs([("written", json!(2))])],
            )
            .on(
                "WHERE r.generation IS NULL",
                vec![Row::from_pairs([("stamped", json!(2))])],
            )
            .on(
                "RETURN count(r) AS removed",
                vec![Row::from_pairs([("removed", json!(1))])],
            )
            .on_with("r.shared_domains IS NULL", move |_| {
                if flag.swap(true, Ordering::SeqCst) {
                    return Ok(vec![]);
                }
                Ok(vec![Row::from_pairs([
                    ("edge_id", json!("5:x:1")),
                    ("jaccard_weight", json!(4.0 / 14.0)),
                    ("count_a", json!(10)),
                    ("count_b", json!(8)),
                ])])
            })
            .on_with("WHERE elementId(r) = row.edge_id", |params| {
                let n = params["rows"].as_array().map(Vec::len).unwrap_or(0);
                Ok(vec![Row::from_pairs([("enriched", json!(n))])])
            });
        let (svc, mock) = service(mock, Config::default());

        let report = svc
            .rebuild(RebuildOptions {
                engine: Some(SimilarityBackend::Gds),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(report.edges_written, 1);
        assert_eq!(report.edges_enriched, 1);
        assert!(report.stats.is_none());
        let write = &mock.calls_matching("WHERE elementId(r) = row.edge_id")[0];
        assert_eq!(write.params["rows"][0]["shared_domains"], json!(4));
        assert_eq!(write.params["rows"][0]["union_domains"], json!(14));
    }

    #[tokio::test]
    async fn test_staged_gds_edges_stamped_before_promotion() {
        let mock = MockExecutor::new()
            .on(
                "RETURN v.version AS version",
                vec![Row::from_pairs([("version", json!(2))])],
            )
            .on(
                "RETURN g.current AS current",
                vec![Row::from_pairs([("current", json!(1))])],
            )
            .on(
                "RETURN relationshipsWritten",
                vec![Row::from_pairs([("written", json!(4))])],
            )
            .on(
                "RETURN count(r) AS stamped",
                vec![Row::from_pairs([("stamped", json!(4))])],
            );
        let (svc, mock) = service(mock, Config::default());

        let report = svc
            .rebuild(RebuildOptions {
                mode: Some(RebuildMode::Staged),
                engine: Some(SimilarityBackend::Gds),
                ..Default::default()
            })
            .await
            .unwrap();

        // unstamped leftovers of an interrupted GDS write are cleared first
        let clear = &mock.calls_matching("DELETE r")[0];
        assert!(clear.cypher.contains("r.generation IS NULL OR"));

        let write = position(&mock, "gds.nodeSimilarity.write");
        let stamp = position(&mock, "RETURN count(r) AS stamped");
        let promote = position(&mock, "SET g.current = $generation");
        assert!(write < stamp && stamp < promote);
        assert_eq!(mock.calls()[stamp].params["generation"], json!(2));
        assert_eq!(report.generation, 2);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_any_write() {
        let mut config = Config::default();
        config.rebuild.write_batch_size = 0;
        let (svc, mock) = service(native_graph(), config);

        let result = svc.rebuild(RebuildOptions::default()).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_import_runs_before_clearing() {
        let (svc, mock) = service(native_graph(), Config::default());
        let rows = vec![crate::models::ProteinRecord::new("A", ["d1", "d2"])];

        let report = svc
            .rebuild(RebuildOptions {
                source: Some(&rows),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(position(&mock, "UNWIND $rows AS row") < position(&mock, "DELETE r"));
        assert_eq!(report.import.unwrap().rows_written, 1);
    }
}
