//! Neighborhood export: retrieval plus the tiered reduction for rendering.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::config::Config;
use crate::di::FromContext;
use crate::error::AppError;
use crate::models::{
    Domain, Neighborhood, NeighborhoodExport, NodeRole, Protein, VisualizationPayload, VizEdge,
    VizNode, HAS_DOMAIN, SIMILAR,
};
use crate::repositories::{NeighborhoodRepository, SimilarityRepository};

/// Prefix keeping category node ids disjoint from protein ids.
pub const CATEGORY_PREFIX: &str = "dom_";

/// Service producing visualization payloads around a center protein.
#[derive(FromContext, Clone)]
pub struct NeighborhoodService {
    neighborhoods: NeighborhoodRepository,
    similarity: SimilarityRepository,
    config: Arc<Config>,
}

impl NeighborhoodService {
    /// Exports the neighborhood of `center_id`.
    ///
    /// `depth` falls back to the configured default. An unknown center yields
    /// [`NeighborhoodExport::NotFound`], never an error.
    pub async fn export(
        &self,
        center_id: &str,
        depth: Option<u8>,
    ) -> Result<NeighborhoodExport, AppError> {
        let depth = depth.unwrap_or(self.config.export.depth);
        if !matches!(depth, 1 | 2) {
            return Err(AppError::Validation(format!(
                "neighborhood depth must be 1 or 2, got {}",
                depth
            )));
        }

        let generation = self.similarity.current_generation().await?;
        let neighborhood = match self
            .neighborhoods
            .fetch(center_id, depth, generation)
            .await?
        {
            Some(nb) => nb,
            None => {
                tracing::info!(center = center_id, "Center protein not found");
                return Ok(NeighborhoodExport::NotFound {
                    center: center_id.to_string(),
                });
            }
        };

        let payload = reduce_neighborhood(&neighborhood, self.config.export.weight_precision);
        tracing::info!(
            center = center_id,
            depth,
            generation,
            nodes = payload.nodes.len(),
            edges = payload.edges.len(),
            "Exported neighborhood"
        );
        Ok(NeighborhoodExport::Found(payload))
    }
}

// ============================================================================
// Reduction
// ============================================================================

/// Reduces a retrieved neighborhood to what gets drawn.
///
/// - Only center-tier1 and tier1-tier2 edges survive; tier1-tier1 and
///   tier2-tier2 edges are dropped.
/// - Each tier-2 protein keeps one inbound edge: the highest weight, ties
///   going to the lexicographically smaller tier-1 id.
/// - An unordered pair yields at most one edge (the heaviest copy).
/// - Edges point outward: center to tier-1, tier-1 to tier-2.
///
/// Edge ids are assigned in emission order: center edges by neighbor id, then
/// tier-2 edges by tier-2 id, then membership edges.
pub fn reduce_neighborhood(nb: &Neighborhood, precision: u32) -> VisualizationPayload {
    let center = nb.center.uniprot_id.as_str();
    let tier1: BTreeMap<&str, &Protein> = nb
        .tier1
        .iter()
        .filter(|p| p.uniprot_id != center)
        .map(|p| (p.uniprot_id.as_str(), p))
        .collect();
    let tier2: BTreeMap<&str, &Protein> = nb
        .tier2
        .iter()
        .filter(|p| p.uniprot_id != center && !tier1.contains_key(p.uniprot_id.as_str()))
        .map(|p| (p.uniprot_id.as_str(), p))
        .collect();

    let role = |id: &str| -> Option<NodeRole> {
        if id == center {
            Some(NodeRole::Center)
        } else if tier1.contains_key(id) {
            Some(NodeRole::NeighborTier1)
        } else if tier2.contains_key(id) {
            Some(NodeRole::NeighborTier2)
        } else {
            None
        }
    };

    // tier-1 id -> weight of its edge to the center
    let mut center_edges: BTreeMap<&str, f64> = BTreeMap::new();
    // tier-2 id -> (weight, tier-1 id) of its best match
    let mut best_match: BTreeMap<&str, (f64, &str)> = BTreeMap::new();

    for edge in &nb.edges {
        let (u, v) = edge.pair_key();
        let weight = edge.jaccard_weight;
        match (role(u), role(v)) {
            (Some(NodeRole::Center), Some(NodeRole::NeighborTier1)) => {
                keep_heaviest(&mut center_edges, v, weight)
            }
            (Some(NodeRole::NeighborTier1), Some(NodeRole::Center)) => {
                keep_heaviest(&mut center_edges, u, weight)
            }
            (Some(NodeRole::NeighborTier1), Some(NodeRole::NeighborTier2)) => {
                offer_match(&mut best_match, v, u, weight)
            }
            (Some(NodeRole::NeighborTier2), Some(NodeRole::NeighborTier1)) => {
                offer_match(&mut best_match, u, v, weight)
            }
            _ => {}
        }
    }

    let mut nodes = Vec::with_capacity(1 + tier1.len() + best_match.len() + nb.domains.len());
    nodes.push(protein_node(&nb.center, NodeRole::Center));
    nodes.extend(
        tier1
            .values()
            .map(|p| protein_node(p, NodeRole::NeighborTier1)),
    );
    nodes.extend(
        best_match
            .keys()
            .filter_map(|id| tier2.get(id))
            .map(|p| protein_node(p, NodeRole::NeighborTier2)),
    );

    let mut seen_domains = BTreeSet::new();
    let domains: Vec<&Domain> = nb
        .domains
        .iter()
        .filter(|d| seen_domains.insert(d.interpro_id.as_str()))
        .collect();
    nodes.extend(domains.iter().map(|d| category_node(d)));

    let mut edges = Vec::with_capacity(center_edges.len() + best_match.len() + domains.len());
    let mut next_id = {
        let mut n = 0usize;
        move || {
            let id = format!("e_{}", n);
            n += 1;
            id
        }
    };

    for (neighbor, weight) in &center_edges {
        edges.push(VizEdge {
            id: next_id(),
            source: center.to_string(),
            target: neighbor.to_string(),
            relation_type: SIMILAR.to_string(),
            weight: Some(round_to(*weight, precision)),
        });
    }
    for (t2, (weight, t1)) in &best_match {
        edges.push(VizEdge {
            id: next_id(),
            source: t1.to_string(),
            target: t2.to_string(),
            relation_type: SIMILAR.to_string(),
            weight: Some(round_to(*weight, precision)),
        });
    }
    for domain in &domains {
        edges.push(VizEdge {
            id: next_id(),
            source: center.to_string(),
            target: category_id(&domain.interpro_id),
            relation_type: HAS_DOMAIN.to_string(),
            weight: None,
        });
    }

    VisualizationPayload {
        center: center.to_string(),
        depth: nb.depth,
        nodes,
        edges,
    }
}

fn keep_heaviest<'a>(edges: &mut BTreeMap<&'a str, f64>, neighbor: &'a str, weight: f64) {
    edges
        .entry(neighbor)
        .and_modify(|w| *w = w.max(weight))
        .or_insert(weight);
}

fn offer_match<'a>(
    best: &mut BTreeMap<&'a str, (f64, &'a str)>,
    tier2: &'a str,
    tier1: &'a str,
    weight: f64,
) {
    match best.get_mut(tier2) {
        Some(current) => {
            if weight > current.0 || (weight == current.0 && tier1 < current.1) {
                *current = (weight, tier1);
            }
        }
        None => {
            best.insert(tier2, (weight, tier1));
        }
    }
}

fn round_to(weight: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (weight * scale).round() / scale
}

fn category_id(interpro_id: &str) -> String {
    format!("{}{}", CATEGORY_PREFIX, interpro_id)
}

fn protein_node(protein: &Protein, role: NodeRole) -> VizNode {
    let mut attrs = BTreeMap::new();
    attrs.insert("uniprot_id".to_string(), json!(protein.uniprot_id));
    if let Some(organism) = &protein.organism {
        attrs.insert("organism".to_string(), json!(organism));
    }
    if let Some(length) = protein.length {
        attrs.insert("length".to_string(), json!(length));
    }
    if let Some(count) = protein.domain_count {
        attrs.insert("domain_count".to_string(), json!(count));
    }
    if !protein.ec_numbers.is_empty() {
        attrs.insert("ec_numbers".to_string(), json!(protein.ec_numbers));
    }
    attrs.insert("is_labelled".to_string(), JsonValue::Bool(protein.is_labelled));

    VizNode {
        id: protein.uniprot_id.clone(),
        label: protein
            .entry_name
            .clone()
            .unwrap_or_else(|| protein.uniprot_id.clone()),
        role,
        attrs,
    }
}

fn category_node(domain: &Domain) -> VizNode {
    let mut attrs = BTreeMap::new();
    attrs.insert("interpro_id".to_string(), json!(domain.interpro_id));
    VizNode {
        id: category_id(&domain.interpro_id),
        label: domain
            .name
            .clone()
            .unwrap_or_else(|| domain.interpro_id.clone()),
        role: NodeRole::Category,
        attrs,
    }
}
