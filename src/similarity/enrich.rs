//! Reconstruction of overlap counts from a stored Jaccard weight.
//!
//! Solving `J = I / (A + B - I)` for the intersection gives
//! `I = J * (A + B) / (1 + J)`. Weights are stored as floats, so `I` is
//! rounded to the nearest integer. For small domain counts a weight that was
//! itself rounded upstream can land the result one off the true
//! intersection. That error is accepted: the counts are display and ranking
//! aids, and the weight remains the authoritative value.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Shared and union domain counts of one protein pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOverlap {
    pub shared: u32,
    pub union: u32,
}

/// An edge awaiting count reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEnrichment {
    /// Store-side relationship id.
    pub edge_id: String,
    pub jaccard_weight: f64,
    pub count_a: u32,
    pub count_b: u32,
}

/// Reconstructed counts keyed by relationship id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEdge {
    pub edge_id: String,
    pub shared_domains: u32,
    pub union_domains: u32,
}

/// Outcome of enriching a page of edges.
#[derive(Debug, Default)]
pub struct EnrichmentBatch {
    pub enriched: Vec<EnrichedEdge>,
    pub rejected: Vec<(String, AppError)>,
}

/// Stateless per-edge reconstruction of `shared_domains`/`union_domains`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeEnricher;

impl EdgeEnricher {
    /// Reconstructs the overlap of a pair from its weight and domain counts.
    ///
    /// The result depends only on the inputs, so it can be recomputed freely.
    /// The intersection is clamped to `min(a, b)`; a pair with no domains at
    /// all reconstructs to `(0, 0)`.
    pub fn reconstruct(weight: f64, a: u32, b: u32) -> Result<DomainOverlap, AppError> {
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(AppError::Validation(format!(
                "jaccard weight must be within [0, 1], got {}",
                weight
            )));
        }

        let total = u64::from(a) + u64::from(b);
        if total == 0 {
            return Ok(DomainOverlap { shared: 0, union: 0 });
        }

        let estimate = (weight * total as f64 / (1.0 + weight)).round() as u64;
        let shared = estimate.min(u64::from(a.min(b)));
        let union = u32::try_from(total - shared).map_err(|_| {
            AppError::Validation(format!(
                "domain union of {} and {} does not fit a count",
                a, b
            ))
        })?;
        Ok(DomainOverlap {
            // bounded by min(a, b)
            shared: shared as u32,
            union,
        })
    }

    /// Reconstructs a page of edges in parallel.
    pub fn enrich(&self, pending: &[PendingEnrichment]) -> EnrichmentBatch {
        let results: Vec<(String, Result<DomainOverlap, AppError>)> = pending
            .par_iter()
            .map(|edge| {
                (
                    edge.edge_id.clone(),
                    Self::reconstruct(edge.jaccard_weight, edge.count_a, edge.count_b),
                )
            })
            .collect();

        let mut batch = EnrichmentBatch::default();
        for (edge_id, result) in results {
            match result {
                Ok(overlap) => batch.enriched.push(EnrichedEdge {
                    edge_id,
                    shared_domains: overlap.shared,
                    union_domains: overlap.union,
                }),
                Err(e) => batch.rejected.push((edge_id, e)),
            }
        }
        batch
    }
}
