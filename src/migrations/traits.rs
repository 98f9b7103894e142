//! Migration trait and registry.

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::graph::CypherExecutor;

// =============================================================================
// Migration Trait
// =============================================================================

/// A forward-only schema migration.
///
/// Uses BoxFuture to avoid `'static` requirements from `#[async_trait]`.
/// Every statement a migration issues must be idempotent (`IF NOT EXISTS`,
/// `MERGE`) so an interrupted run can simply be repeated.
pub trait Migration: Send + Sync {
    fn id(&self) -> &'static str;
    fn version(&self) -> u32;
    fn description(&self) -> &'static str;
    fn up<'a>(&'a self, ctx: &'a dyn CypherExecutor) -> BoxFuture<'a, Result<(), AppError>>;
}

// =============================================================================
// Migration Registry
// =============================================================================

/// Ordered set of migrations.
pub struct Register {
    migrations: Vec<Box<dyn Migration>>,
}

impl Register {
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    pub fn register(mut self, migration: impl Migration + 'static) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }

    /// Iterate over migrations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Migration> {
        self.migrations.iter().map(|m| m.as_ref())
    }
}

impl Default for Register {
    fn default() -> Self {
        Self::new()
    }
}
