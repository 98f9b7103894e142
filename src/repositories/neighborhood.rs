//! Neighborhood repository: bounded-depth retrieval around a center protein.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::context::AppGraph;
use crate::di::FromContext;
use crate::error::AppError;
use crate::graph::QueryExt;
use crate::models::{Domain, Neighborhood, Protein, SimilarityEdge};

/// A neighbor protein plus the weight of the edge that reached it.
#[derive(Debug, Deserialize)]
struct HopRow {
    /// Endpoint the hop started from.
    via: String,
    #[serde(flatten)]
    protein: Protein,
    jaccard_weight: f64,
}

const NEIGHBOR_COLUMNS: &str = "n.uniprot_id AS uniprot_id,
     n.entry_name AS entry_name,
     n.organism AS organism,
     n.length AS length,
     coalesce(n.ec_numbers, []) AS ec_numbers,
     coalesce(n.is_labelled, false) AS is_labelled,
     n.domain_count AS domain_count";

/// Repository for neighborhood reads over one similarity generation.
#[derive(FromContext, Clone)]
pub struct NeighborhoodRepository {
    graph: AppGraph,
}

impl NeighborhoodRepository {
    /// Retrieves the neighborhood of `center_id` up to `depth` hops.
    ///
    /// Returns `None` if the center protein does not exist. Edges are
    /// returned as stored; no filtering beyond the hop structure happens here.
    pub async fn fetch(
        &self,
        center_id: &str,
        depth: u8,
        generation: i64,
    ) -> Result<Option<Neighborhood>, AppError> {
        let center = match self.center(center_id).await? {
            Some(center) => center,
            None => return Ok(None),
        };

        let mut edges = Vec::new();
        let mut tier1 = BTreeMap::new();
        for hop in self.hops(&[center_id.to_string()], center_id, generation).await? {
            edges.push(SimilarityEdge::weighted(
                &hop.via,
                &hop.protein.uniprot_id,
                hop.jaccard_weight,
            ));
            tier1
                .entry(hop.protein.uniprot_id.clone())
                .or_insert(hop.protein);
        }

        let mut tier2 = BTreeMap::new();
        if depth >= 2 && !tier1.is_empty() {
            let tier1_ids: Vec<String> = tier1.keys().cloned().collect();
            for hop in self.hops(&tier1_ids, center_id, generation).await? {
                let id = hop.protein.uniprot_id.clone();
                edges.push(SimilarityEdge::weighted(&hop.via, &id, hop.jaccard_weight));
                if !tier1.contains_key(&id) {
                    tier2.entry(id).or_insert(hop.protein);
                }
            }

            if tier2.len() > 1 {
                let tier2_ids: Vec<String> = tier2.keys().cloned().collect();
                edges.extend(self.edges_within(&tier2_ids, generation).await?);
            }
        }

        let domains = self.domains_of(center_id).await?;

        Ok(Some(Neighborhood {
            center,
            depth,
            tier1: tier1.into_values().collect(),
            tier2: tier2.into_values().collect(),
            edges,
            domains,
        }))
    }

    async fn center(&self, center_id: &str) -> Result<Option<Protein>, AppError> {
        let row = self
            .graph
            .query(&format!(
                "MATCH (n:Protein {{uniprot_id: $id}}) RETURN {}",
                NEIGHBOR_COLUMNS
            ))
            .param("id", center_id)
            .fetch_one()
            .await?;
        row.map(|r| r.decode()).transpose()
    }

    /// One similarity hop out of `from`, never landing on the center.
    async fn hops(
        &self,
        from: &[String],
        center_id: &str,
        generation: i64,
    ) -> Result<Vec<HopRow>, AppError> {
        self.graph
            .query(&format!(
                "MATCH (s:Protein)-[r:SIMILAR]-(n:Protein)
                 WHERE s.uniprot_id IN $from
                   AND r.generation = $generation
                   AND n.uniprot_id <> $center
                 RETURN s.uniprot_id AS via, r.jaccard_weight AS jaccard_weight, {}
                 ORDER BY via, uniprot_id",
                NEIGHBOR_COLUMNS
            ))
            .param("from", from)
            .param("center", center_id)
            .param("generation", generation)
            .fetch_as()
            .await
    }

    /// Edges with both endpoints in `ids`.
    async fn edges_within(
        &self,
        ids: &[String],
        generation: i64,
    ) -> Result<Vec<SimilarityEdge>, AppError> {
        self.graph
            .query(
                "MATCH (a:Protein)-[r:SIMILAR]->(b:Protein)
                 WHERE a.uniprot_id IN $ids AND b.uniprot_id IN $ids
                   AND r.generation = $generation
                 RETURN a.uniprot_id AS source, b.uniprot_id AS target,
                        r.jaccard_weight AS jaccard_weight,
                        r.shared_domains AS shared_domains,
                        r.union_domains AS union_domains",
            )
            .param("ids", ids)
            .param("generation", generation)
            .fetch_as()
            .await
    }

    async fn domains_of(&self, center_id: &str) -> Result<Vec<Domain>, AppError> {
        let domains: Vec<Domain> = self
            .graph
            .query(
                "MATCH (:Protein {uniprot_id: $id})-[:HAS_DOMAIN]->(d:Domain)
                 RETURN d.interpro_id AS interpro_id, d.name AS name
                 ORDER BY interpro_id",
            )
            .param("id", center_id)
            .fetch_as()
            .await?;

        let mut seen = BTreeSet::new();
        Ok(domains
            .into_iter()
            .filter(|d| seen.insert(d.interpro_id.clone()))
            .collect())
    }
}
