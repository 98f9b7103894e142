//! Domain-sharing similarity: the inverted index, the Jaccard engine and the
//! weight-to-count enricher. Pure computation, no store access.

mod engine;
mod enrich;
mod index;

pub use engine::{SimilarityEngine, SimilarityRun, SimilarityStats};
pub use enrich::{DomainOverlap, EdgeEnricher, EnrichedEdge, EnrichmentBatch, PendingEnrichment};
pub use index::{DomainIndex, DomainIndexBuilder, EntityIdx};
