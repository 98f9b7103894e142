//! Domain (category) models.

use serde::{Deserialize, Serialize};

/// An InterPro domain node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub interpro_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One `(:Protein)-[:HAS_DOMAIN]->(:Domain)` membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMembership {
    pub uniprot_id: String,
    pub interpro_id: String,
}
