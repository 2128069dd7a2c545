//! Derive macro for `redops::db::Columns`.
//!
//! Field attributes:
//!
//! - `#[db(column = "name")]` storage column of the field (`"-"` excludes it)
//! - `#[db(nested)]` the field holds a struct or pointer to walk into
//! - `#[db(embed)]` embedded field: walked into, and its own column counts
//!   even when the field is not `pub`
//! - `#[sql(ignore)]` never emit this field's own column

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Member, Type, Visibility, parse_macro_input};

#[proc_macro_derive(Columns, attributes(db, sql))]
pub fn derive_columns(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    nested: bool,
    embed: bool,
    ignore: bool,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "Columns can only be derived for structs",
            ));
        }
    };

    let members: Vec<(Member, &syn::Field)> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| f.ident.clone().map(|ident| (Member::Named(ident), f)))
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| (Member::Unnamed(i.into()), f))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let mut descriptors = Vec::with_capacity(members.len());
    let mut nested_arms = Vec::new();

    for (index, (member, field)) in members.iter().enumerate() {
        let attrs = parse_field_attrs(field)?;
        let name = match member {
            Member::Named(ident) => ident.to_string(),
            Member::Unnamed(idx) => idx.index.to_string(),
        };
        let column = attrs.column.unwrap_or_default();
        let ignore = attrs.ignore;
        let exported = matches!(field.vis, Visibility::Public(_));
        let embedded = attrs.embed;

        let kind = if attrs.nested || attrs.embed {
            nested_arms.push(quote! {
                #index => ::core::option::Option::Some(&self.#member as &dyn ::redops::db::Columns),
            });
            if is_pointer(&field.ty) {
                quote!(::redops::db::FieldKind::Pointer)
            } else {
                quote!(::redops::db::FieldKind::Struct)
            }
        } else {
            quote!(::redops::db::FieldKind::Scalar)
        };

        descriptors.push(quote! {
            ::redops::db::FieldDescriptor {
                name: #name,
                column: #column,
                ignore: #ignore,
                exported: #exported,
                embedded: #embedded,
                kind: #kind,
            }
        });
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::redops::db::Columns for #ident #ty_generics #where_clause {
            fn fields(&self) -> &'static [::redops::db::FieldDescriptor] {
                const FIELDS: &[::redops::db::FieldDescriptor] = &[#(#descriptors),*];
                FIELDS
            }

            fn nested(&self, index: usize) -> ::core::option::Option<&dyn ::redops::db::Columns> {
                match index {
                    #(#nested_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if attr.path().is_ident("db") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.column = Some(value.value());
                    Ok(())
                } else if meta.path.is_ident("nested") {
                    attrs.nested = true;
                    Ok(())
                } else if meta.path.is_ident("embed") {
                    attrs.embed = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `column = \"...\"`, `nested` or `embed`"))
                }
            })?;
        } else if attr.path().is_ident("sql") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("ignore") {
                    attrs.ignore = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `ignore`"))
                }
            })?;
        }
    }
    Ok(attrs)
}

/// `Box<_>`, `Option<_>` and `Arc<_>` fields may be absent or indirect.
fn is_pointer(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|seg| matches!(seg.ident.to_string().as_str(), "Box" | "Option" | "Arc")),
        Type::Reference(_) => true,
        _ => false,
    }
}
