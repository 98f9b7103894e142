//! Orchestration services.
//!
//! Services combine repositories with the pure similarity components,
//! using the `FromContext` derive macro for dependency injection.

mod import;
mod neighborhood;
mod rebuild;

pub use import::{ImportFailure, ImportReport, ImportService};
pub use neighborhood::{reduce_neighborhood, NeighborhoodService, CATEGORY_PREFIX};
pub use rebuild::{RebuildOptions, RebuildReport, RebuildService};
