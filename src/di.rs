//! Wiring of repositories and services to the application [`Context`].
//!
//! [`Context`]: crate::context::Context
//!
//! The context derive exposes the store handle and config through
//! [`FromRef`]. Repositories and services derive `FromContext` and resolve
//! their fields from those, so a service is built with one call:
//!
//! ```ignore
//! let ctx = Context::connect(config).await?;
//! let rebuild = RebuildService::from_ref(&ctx);
//! ```
//!
//! Fields marked `#[from_context(default)]` hold stateless helpers and are
//! built with `Default` instead of being looked up.

/// Builds `Self` from a shared reference to `T`.
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl<T: Clone> FromRef<T> for T {
    fn from_ref(input: &T) -> Self {
        input.clone()
    }
}

pub use di_macros::{Context, FromContext};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::context::{AppGraph, Context};
    use crate::graph::mock::MockExecutor;

    #[test]
    fn test_context_fields_share_state() {
        let mut config = Config::default();
        config.rebuild.write_batch_size = 77;
        let ctx = Context::new(Arc::new(MockExecutor::new()), config);

        let graph = AppGraph::from_ref(&ctx);
        let resolved = Arc::<Config>::from_ref(&ctx);

        assert!(Arc::ptr_eq(&graph, &ctx.graph));
        assert!(Arc::ptr_eq(&resolved, &ctx.config));
        assert_eq!(resolved.rebuild.write_batch_size, 77);
    }
}
