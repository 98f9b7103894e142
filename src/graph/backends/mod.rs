//! Store backends.
//!
//! Each backend implements [`CypherExecutor`](crate::graph::CypherExecutor)
//! over its driver and maps driver failures onto
//! [`AppError`](crate::error::AppError) so callers can tell retryable
//! connection trouble from constraint violations and bad statements.
//!
//! | Backend | Module |
//! |---------|--------|
//! | Neo4j (Bolt) | [`neo4j`] |

pub mod neo4j;
