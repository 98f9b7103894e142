//! Data access layer for graph operations.
//!
//! Repositories provide a clean abstraction over graph queries,
//! using the `FromContext` derive macro for dependency injection.
//! Store rows are converted into typed models here and nowhere else.

mod neighborhood;
mod protein;
mod similarity;

pub use neighborhood::NeighborhoodRepository;
pub use protein::ProteinRepository;
pub use similarity::{GdsSimilarityParams, GenerationScope, SimilarityRepository};
