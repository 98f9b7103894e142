//! Protein repository: merge-by-key import, domain counts and the
//! membership scan feeding the similarity engine.

use futures::TryStreamExt;
use serde::Serialize;

use crate::context::AppGraph;
use crate::di::FromContext;
use crate::error::AppError;
use crate::graph::QueryExt;
use crate::models::ProteinRecord;
use crate::similarity::DomainIndex;

/// Shape of one `$rows` element in the import statement.
#[derive(Debug, Serialize)]
struct ImportRow<'a> {
    uniprot_id: &'a str,
    entry_name: Option<&'a str>,
    organism: Option<&'a str>,
    length: Option<i64>,
    ec_numbers: &'a [String],
    is_labelled: bool,
    interpro_ids: Vec<String>,
}

impl<'a> From<&'a ProteinRecord> for ImportRow<'a> {
    fn from(record: &'a ProteinRecord) -> Self {
        Self {
            uniprot_id: record.uniprot_id.trim(),
            entry_name: record.entry_name.as_deref(),
            organism: record.organism.as_deref(),
            length: record.length,
            ec_numbers: &record.ec_numbers,
            is_labelled: record.labelled(),
            interpro_ids: record.domain_ids(),
        }
    }
}

// Proteins without domains still get merged: the protein MERGE happens before
// the domain UNWIND, which yields no rows for an empty list.
const UPSERT_PROTEINS: &str = "UNWIND $rows AS row
     MERGE (p:Protein {uniprot_id: row.uniprot_id})
     SET p.entry_name = row.entry_name,
         p.organism = row.organism,
         p.length = row.length,
         p.ec_numbers = row.ec_numbers,
         p.is_labelled = row.is_labelled
     WITH p, row
     UNWIND row.interpro_ids AS interpro_id
     MERGE (d:Domain {interpro_id: interpro_id})
     MERGE (p)-[:HAS_DOMAIN]->(d)";

/// Repository for Protein and Domain nodes and their memberships.
#[derive(FromContext, Clone)]
pub struct ProteinRepository {
    graph: AppGraph,
}

impl ProteinRepository {
    /// Merges a batch of records in one statement (one transaction).
    ///
    /// Re-applying the same batch is a no-op apart from overwriting the
    /// mutable protein fields with the same values.
    pub async fn upsert_batch(&self, records: &[ProteinRecord]) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }
        let rows: Vec<ImportRow<'_>> = records.iter().map(ImportRow::from).collect();
        self.graph
            .query(UPSERT_PROTEINS)
            .param("rows", &rows)
            .run()
            .await
    }

    /// Merges a single record.
    pub async fn upsert(&self, record: &ProteinRecord) -> Result<(), AppError> {
        self.upsert_batch(std::slice::from_ref(record)).await
    }

    /// Recomputes the cached `domain_count` of every protein from its current
    /// memberships. Returns the number of proteins updated.
    pub async fn recompute_domain_counts(&self) -> Result<u64, AppError> {
        let row = self
            .graph
            .query(
                "MATCH (p:Protein)
                 SET p.domain_count = size([(p)-[:HAS_DOMAIN]->(:Domain) | 1])
                 RETURN count(p) AS updated",
            )
            .fetch_one()
            .await?;

        match row {
            Some(row) => row.get("updated"),
            None => Ok(0),
        }
    }

    /// Streams every membership out of the store into a [`DomainIndex`].
    ///
    /// Proteins without domains are registered too so they show up with a
    /// count of zero.
    pub async fn load_domain_index(&self) -> Result<DomainIndex, AppError> {
        let mut stream = self
            .graph
            .query(
                "MATCH (p:Protein)
                 OPTIONAL MATCH (p)-[:HAS_DOMAIN]->(d:Domain)
                 RETURN p.uniprot_id AS uniprot_id, d.interpro_id AS interpro_id",
            )
            .execute()
            .await?;

        let mut builder = DomainIndex::builder();
        let mut rows = 0usize;
        while let Some(row) = stream.try_next().await? {
            let uniprot_id: String = row.get("uniprot_id")?;
            match row.get_opt::<String>("interpro_id")? {
                Some(domain) => builder.add_membership(&uniprot_id, &domain),
                None => {
                    builder.add_entity(&uniprot_id);
                }
            }
            rows += 1;
        }

        let index = builder.build();
        tracing::debug!(
            rows,
            proteins = index.entity_count(),
            domains = index.domain_count_total(),
            "Loaded domain index"
        );
        Ok(index)
    }
}
