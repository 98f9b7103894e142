//! Domain models for the protein similarity graph.

mod domain;
mod neighborhood;
mod protein;
mod similarity;

pub use domain::{Domain, DomainMembership};
pub use neighborhood::{
    CytoscapeElement, Neighborhood, NeighborhoodExport, NodeRole, VisualizationPayload, VizEdge,
    VizNode,
};
pub use protein::{Protein, ProteinRecord};
pub use similarity::{SimilarityEdge, HAS_DOMAIN, SIMILAR};
