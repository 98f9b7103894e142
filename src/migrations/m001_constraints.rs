//! Uniqueness constraints for the merge keys and the organism lookup index.

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::AppError;
use crate::graph::{CypherExecutor, Query};
use crate::migrations::Migration;

const STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT protein_uniprot_id IF NOT EXISTS
     FOR (p:Protein) REQUIRE p.uniprot_id IS UNIQUE",
    "CREATE CONSTRAINT domain_interpro_id IF NOT EXISTS
     FOR (d:Domain) REQUIRE d.interpro_id IS UNIQUE",
    "CREATE INDEX protein_organism IF NOT EXISTS
     FOR (p:Protein) ON (p.organism)",
];

pub struct M001Constraints;

impl Migration for M001Constraints {
    fn id(&self) -> &'static str {
        "m001_constraints"
    }

    fn version(&self) -> u32 {
        1
    }

    fn description(&self) -> &'static str {
        "Unique Protein.uniprot_id and Domain.interpro_id, index on Protein.organism"
    }

    fn up<'a>(&'a self, ctx: &'a dyn CypherExecutor) -> BoxFuture<'a, Result<(), AppError>> {
        async move {
            for statement in STATEMENTS {
                Query::new(ctx, statement).run().await?;
            }
            Ok(())
        }
        .boxed()
    }
}
