//! `#[derive(FromContext)]`: field-wise construction from the app context.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Field};

use crate::fields::named_fields;

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let fields = named_fields(input, "FromContext")?;

    let inits = fields
        .iter()
        .map(|field| {
            let ident = &field.ident;
            let ty = &field.ty;
            Ok(if is_default(field)? {
                quote! { #ident: <#ty as ::std::default::Default>::default() }
            } else {
                quote! {
                    #ident: <#ty as crate::di::FromRef<crate::context::Context>>::from_ref(ctx)
                }
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl crate::di::FromRef<crate::context::Context> for #name {
            fn from_ref(ctx: &crate::context::Context) -> Self {
                Self { #(#inits),* }
            }
        }
    })
}

/// Whether the field carries `#[from_context(default)]`.
fn is_default(field: &Field) -> syn::Result<bool> {
    let mut default = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("from_context") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = true;
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        })?;
    }
    Ok(default)
}
