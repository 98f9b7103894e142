//! Protgraph - protein domain-similarity graph
//!
//! Imports proteins and their InterPro domains into Neo4j, rebuilds the
//! Jaccard-weighted SIMILAR relation between proteins that share domains, and
//! exports bounded neighborhoods for visualization.

pub mod cli;
pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod graph;
pub mod migrations;
pub mod models;
pub mod repositories;
pub mod services;
pub mod similarity;
pub mod source;

// Used by the integration tests and other embedders.
pub use di::FromRef;
