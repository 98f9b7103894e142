//! Generation pointer for the similarity relation.
//!
//! The pointer starts at generation 1. SIMILAR edges written before this
//! migration are stamped into it, so every edge a reader can match carries an
//! explicit generation.

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::AppError;
use crate::graph::{CypherExecutor, Query};
use crate::migrations::Migration;
use crate::models::SIMILAR;

/// Generation of pre-existing edges and of the pointer on creation.
pub const INITIAL_GENERATION: i64 = 1;

pub struct M002SimilarityGeneration;

impl Migration for M002SimilarityGeneration {
    fn id(&self) -> &'static str {
        "m002_similarity_generation"
    }

    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "SimilarityGeneration pointer, generation and domain_count indexes"
    }

    fn up<'a>(&'a self, ctx: &'a dyn CypherExecutor) -> BoxFuture<'a, Result<(), AppError>> {
        async move {
            Query::new(
                ctx,
                "CREATE CONSTRAINT similarity_generation_relation IF NOT EXISTS
                 FOR (g:SimilarityGeneration) REQUIRE g.relation IS UNIQUE",
            )
            .run()
            .await?;

            Query::new(
                ctx,
                "CREATE INDEX protein_domain_count IF NOT EXISTS
                 FOR (p:Protein) ON (p.domain_count)",
            )
            .run()
            .await?;

            Query::new(
                ctx,
                "CREATE INDEX similar_generation IF NOT EXISTS
                 FOR ()-[r:SIMILAR]-() ON (r.generation)",
            )
            .run()
            .await?;

            Query::new(
                ctx,
                "MATCH ()-[r:SIMILAR]->()
                 WHERE r.generation IS NULL
                 SET r.generation = $generation",
            )
            .param("generation", INITIAL_GENERATION)
            .run()
            .await?;

            Query::new(
                ctx,
                "MERGE (g:SimilarityGeneration {relation: $relation})
                 ON CREATE SET g.current = $generation",
            )
            .param("generation", INITIAL_GENERATION)
            .param("relation", SIMILAR)
            .run()
            .await?;

            Ok(())
        }
        .boxed()
    }
}
