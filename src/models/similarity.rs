//! Similarity relation models.

use serde::{Deserialize, Serialize};

/// Relationship type of the similarity relation.
pub const SIMILAR: &str = "SIMILAR";

/// Relationship type of protein-to-domain membership.
pub const HAS_DOMAIN: &str = "HAS_DOMAIN";

/// A Jaccard similarity edge between two proteins.
///
/// The relation is undirected; `source`/`target` only carry an orientation
/// for storage and display. Counts are absent when the weight came from an
/// engine that only reports the coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub source: String,
    pub target: String,
    pub jaccard_weight: f64,
    #[serde(default)]
    pub shared_domains: Option<u32>,
    #[serde(default)]
    pub union_domains: Option<u32>,
}

impl SimilarityEdge {
    /// Creates an edge without overlap counts.
    pub fn weighted(source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            jaccard_weight: weight,
            shared_domains: None,
            union_domains: None,
        }
    }

    /// The unordered pair, smaller id first.
    pub fn pair_key(&self) -> (&str, &str) {
        if self.source <= self.target {
            (&self.source, &self.target)
        } else {
            (&self.target, &self.source)
        }
    }
}
