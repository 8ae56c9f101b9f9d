//! Derive macro for `AsCborValue`.
//!
//! Structs convert to/from a CBOR array holding each field in declaration
//! order; fieldless enums convert to/from a CBOR integer holding the
//! discriminant. Using this macro requires that `AsCborValue`, `CborError` and
//! `cbor_type_error` are locally `use`d.

use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::{
    parse_macro_input, parse_quote, spanned::Spanned, Data, DeriveInput, Fields, GenericParam,
    Generics, Index,
};

/// Derive macro that implements the `AsCborValue` trait.
#[proc_macro_derive(AsCborValue)]
pub fn derive_as_cbor_value(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    // Every type parameter needs to be convertible itself.
    let generics = add_trait_bounds(&input.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let from_val = from_val_impl(&input.data);
    let to_val = to_val_impl(&input.data);

    let expanded = quote! {
        impl #impl_generics AsCborValue for #name #ty_generics #where_clause {
            fn from_cbor_value(value: ciborium::value::Value) -> Result<Self, CborError> {
                #from_val
            }
            fn to_cbor_value(self) -> Result<ciborium::value::Value, CborError> {
                #to_val
            }
        }
    };
    expanded.into()
}

fn add_trait_bounds(generics: &Generics) -> Generics {
    let mut generics = generics.clone();
    for param in &mut generics.params {
        if let GenericParam::Type(ref mut type_param) = *param {
            type_param.bounds.push(parse_quote!(AsCborValue));
        }
    }
    generics
}

/// Generate the body of `to_cbor_value` for the type.
fn to_val_impl(data: &Data) -> TokenStream {
    match data {
        Data::Struct(data) => {
            // Each field in turn, as fully-qualified calls so that field types
            // only need `AsCborValue` in scope.
            let fields: Vec<TokenStream> = match &data.fields {
                Fields::Named(fields) => fields
                    .named
                    .iter()
                    .map(|f| {
                        let name = &f.ident;
                        quote_spanned! {f.span()=> AsCborValue::to_cbor_value(self.#name)? }
                    })
                    .collect(),
                Fields::Unnamed(fields) => fields
                    .unnamed
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        let index = Index::from(i);
                        quote_spanned! {f.span()=> AsCborValue::to_cbor_value(self.#index)? }
                    })
                    .collect(),
                Fields::Unit => unimplemented!("unit structs not supported"),
            };
            quote! {
                Ok(ciborium::value::Value::Array(alloc::vec![ #(#fields, )* ]))
            }
        }
        Data::Enum(_) => quote! {
            let v: ciborium::value::Integer = (self as i32).into();
            Ok(ciborium::value::Value::Integer(v))
        },
        Data::Union(_) => unimplemented!("unions not supported"),
    }
}

/// Generate the body of `from_cbor_value` for the type.
fn from_val_impl(data: &Data) -> TokenStream {
    match data {
        Data::Struct(data) => {
            let nfields = match &data.fields {
                Fields::Named(fields) => fields.named.len(),
                Fields::Unnamed(fields) => fields.unnamed.len(),
                Fields::Unit => unimplemented!("unit structs not supported"),
            };
            // Fields are pulled out in reverse order to reduce shifting within
            // the decoded array.
            let body = match &data.fields {
                Fields::Named(fields) => {
                    let recurse = fields.named.iter().enumerate().rev().map(|(i, f)| {
                        let name = &f.ident;
                        let index = Index::from(i);
                        let typ = &f.ty;
                        quote_spanned! {f.span()=>
                            #name: <#typ>::from_cbor_value(a.remove(#index))?
                        }
                    });
                    quote! { Ok(Self { #(#recurse, )* }) }
                }
                Fields::Unnamed(fields) => {
                    let extract = fields.unnamed.iter().enumerate().rev().map(|(i, f)| {
                        let typ = &f.ty;
                        let varname = format_ident!("field_{}", i);
                        quote_spanned! {f.span()=>
                            let #varname = <#typ>::from_cbor_value(a.remove(#i))?;
                        }
                    });
                    let rebuild = fields.unnamed.iter().enumerate().map(|(i, _f)| {
                        let varname = format_ident!("field_{}", i);
                        quote! { #varname }
                    });
                    quote! {
                        #(#extract)*
                        Ok(Self( #(#rebuild, )* ))
                    }
                }
                Fields::Unit => unreachable!(),
            };
            quote! {
                let mut a = match value {
                    ciborium::value::Value::Array(a) => a,
                    _ => return cbor_type_error(&value, "arr"),
                };
                if a.len() != #nfields {
                    return Err(CborError::UnexpectedItem(
                        "arr",
                        concat!("arr len ", stringify!(#nfields)),
                    ));
                }
                #body
            }
        }
        Data::Enum(enum_data) => {
            // Only fieldless variants are supported.
            let recurse = enum_data.variants.iter().map(|variant| {
                let vname = &variant.ident;
                quote_spanned! {variant.span()=>
                    x if x == Self::#vname as i32 => Ok(Self::#vname),
                }
            });
            quote! {
                use core::convert::TryInto;
                let v: i32 = match value {
                    ciborium::value::Value::Integer(i) => {
                        i.try_into().map_err(|_| CborError::OutOfRangeIntegerValue)?
                    }
                    v => return cbor_type_error(&v, &"int"),
                };
                match v {
                    #(#recurse)*
                    _ => Err(CborError::NonEnumValue),
                }
            }
        }
        Data::Union(_) => unimplemented!("unions not supported"),
    }
}
