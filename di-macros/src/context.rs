//! `#[derive(Context)]`: one `FromRef` impl per context field.

use std::collections::HashSet;

use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::DeriveInput;

use crate::fields::named_fields;

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let fields = named_fields(input, "Context")?;

    let mut seen = HashSet::new();
    let mut impls = Vec::with_capacity(fields.len());
    for field in fields {
        let ty = &field.ty;
        if !seen.insert(ty.to_token_stream().to_string()) {
            return Err(syn::Error::new_spanned(
                ty,
                "another context field already has this type",
            ));
        }
        let ident = &field.ident;
        impls.push(quote! {
            impl crate::di::FromRef<#name> for #ty {
                fn from_ref(ctx: &#name) -> Self {
                    ::std::clone::Clone::clone(&ctx.#ident)
                }
            }
        });
    }

    Ok(quote! { #(#impls)* })
}
