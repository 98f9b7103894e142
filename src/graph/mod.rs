//! Graph store access layer.
//!
//! Everything above this module talks to the store through the
//! [`CypherExecutor`] trait and the fluent [`Query`] builder it gains from
//! [`QueryExt`]. The application holds one shared handle
//! (`Arc<dyn CypherExecutor>`) created at startup.
//!
//! # Usage
//!
//! ```ignore
//! use protgraph::graph::QueryExt;
//!
//! // Read with parameters
//! let rows = graph
//!     .query("MATCH (p:Protein {uniprot_id: $id})-[:HAS_DOMAIN]->(d:Domain) RETURN d.interpro_id AS id")
//!     .param("id", "P12345")
//!     .fetch_all()
//!     .await?;
//!
//! // Batched write (no results)
//! graph
//!     .query("UNWIND $rows AS row MERGE (d:Domain {interpro_id: row})")
//!     .param("rows", &domain_ids)
//!     .run()
//!     .await?;
//! ```

mod macros;
mod query;
mod row;
mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub mod backends;

pub use query::{Query, QueryExt};
pub use row::{Params, Row, RowStream};
pub use traits::CypherExecutor;

// Re-export macro (defined at crate root via #[macro_export])
#[doc(inline)]
pub use crate::cypher;
