//! Input checks shared by both derives.

use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Data, DeriveInput, Field, Fields};

/// Named fields of a non-generic struct, or an error naming the derive.
pub fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> syn::Result<&'a Punctuated<Field, Comma>> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            format!("{} cannot be derived for generic types", derive),
        ));
    }
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{} needs a struct with named fields", derive),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{} can only be derived for structs", derive),
        )),
    }
}
