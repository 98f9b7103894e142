//! Neighborhood retrieval results and the visualization payload built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::{Domain, Protein, SimilarityEdge};

// ============================================================================
// Retrieved Neighborhood (store boundary)
// ============================================================================

/// A bounded-depth neighborhood as retrieved from the store, before any
/// rendering reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neighborhood {
    /// The center protein.
    pub center: Protein,
    /// Requested depth (1 or 2).
    pub depth: u8,
    /// Proteins one similarity hop from the center.
    pub tier1: Vec<Protein>,
    /// Proteins reached through a tier-1 protein, excluding center and tier-1.
    pub tier2: Vec<Protein>,
    /// Similarity edges among center, tier-1 and tier-2, in any orientation.
    pub edges: Vec<SimilarityEdge>,
    /// Domains of the center protein.
    pub domains: Vec<Domain>,
}

// ============================================================================
// Visualization Payload
// ============================================================================

/// Role of a node in the rendered neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Center,
    NeighborTier1,
    NeighborTier2,
    Category,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::NeighborTier1 => "neighbor_tier1",
            Self::NeighborTier2 => "neighbor_tier2",
            Self::Category => "category",
        }
    }
}

/// A rendered node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizNode {
    /// Node id; category ids carry the `dom_` prefix.
    pub id: String,
    /// Display label.
    pub label: String,
    pub role: NodeRole,
    /// Display attributes (organism, length, labelled flag, ...).
    #[serde(flatten)]
    pub attrs: BTreeMap<String, JsonValue>,
}

/// A rendered edge, oriented outward from the center for layout only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation_type: String,
    /// Jaccard weight rounded for display; absent for membership edges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Node and edge lists ready for a front-end graph renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationPayload {
    pub center: String,
    pub depth: u8,
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

/// A Cytoscape.js element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CytoscapeElement {
    /// `"nodes"` or `"edges"`.
    pub group: String,
    pub data: JsonValue,
}

impl VisualizationPayload {
    /// Returns nodes with the given role.
    pub fn nodes_with_role(&self, role: NodeRole) -> impl Iterator<Item = &VizNode> {
        self.nodes.iter().filter(move |n| n.role == role)
    }

    /// Converts the payload into a Cytoscape.js element list.
    pub fn to_cytoscape(&self) -> Vec<CytoscapeElement> {
        let nodes = self.nodes.iter().map(|node| {
            let mut data = serde_json::Map::new();
            data.insert("id".into(), json!(node.id));
            data.insert("label".into(), json!(node.label));
            data.insert("type".into(), json!(node.role.as_str()));
            for (key, value) in &node.attrs {
                data.insert(key.clone(), value.clone());
            }
            CytoscapeElement {
                group: "nodes".into(),
                data: JsonValue::Object(data),
            }
        });

        let edges = self.edges.iter().map(|edge| {
            let mut data = json!({
                "id": edge.id,
                "source": edge.source,
                "target": edge.target,
                "label": edge.relation_type,
            });
            if let Some(weight) = edge.weight {
                data["weight"] = json!(weight);
            }
            CytoscapeElement {
                group: "edges".into(),
                data,
            }
        });

        nodes.chain(edges).collect()
    }
}

/// Result of a neighborhood export.
///
/// An unknown center is reported as `NotFound`; a known center without
/// neighbors is `Found` with only the center and its categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NeighborhoodExport {
    NotFound { center: String },
    Found(VisualizationPayload),
}

impl NeighborhoodExport {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn payload(&self) -> Option<&VisualizationPayload> {
        match self {
            Self::Found(payload) => Some(payload),
            Self::NotFound { .. } => None,
        }
    }
}
