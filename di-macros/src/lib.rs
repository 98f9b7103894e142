//! Derive macros wiring protgraph's repositories and services to its
//! application context.
//!
//! - `#[derive(Context)]` goes on the context struct. Each field becomes
//!   resolvable as `FromRef<Context>` for its type.
//! - `#[derive(FromContext)]` goes on a repository or service. It builds the
//!   struct from `crate::context::Context`, one field at a time.
//!
//! The generated code names `crate::di::FromRef` and `crate::context::Context`,
//! so these derives only work inside the protgraph crate.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod context;
mod fields;
mod from_context;

/// Exposes every field of the context struct through `FromRef`.
///
/// ```ignore
/// #[derive(Context, Clone)]
/// pub struct Context {
///     pub graph: AppGraph,
///     pub config: Arc<Config>,
/// }
///
/// // impl FromRef<Context> for AppGraph { ... }
/// // impl FromRef<Context> for Arc<Config> { ... }
/// ```
///
/// Two fields of the same type would resolve ambiguously and are rejected.
#[proc_macro_derive(Context)]
pub fn derive_context(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    context::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Builds a repository or service from the application context.
///
/// Fields resolve through `FromRef<Context>`: the store handle and config
/// directly, other repositories and services through their own derive.
/// Fields marked `#[from_context(default)]` are stateless helpers that come
/// from `Default` instead.
///
/// ```ignore
/// #[derive(FromContext, Clone)]
/// pub struct RebuildService {
///     similarity: SimilarityRepository,
///     config: Arc<Config>,
///     #[from_context(default)]
///     enricher: EdgeEnricher,
/// }
/// ```
#[proc_macro_derive(FromContext, attributes(from_context))]
pub fn derive_from_context(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_context::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
