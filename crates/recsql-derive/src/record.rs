//! Record derive macro implementation

use crate::attr::{field_attr, record_attr};
use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{Data, DeriveInput, Fields, Result};

const SYSTEM_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

const MAX_PREFIX_LEN: usize = 7;

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let attr = record_attr(&input.attrs)?;
    let table = attr.table.ok_or_else(|| {
        syn::Error::new_spanned(&input, "Record requires #[record(table = \"table_name\")]")
    })?;
    let prefix = attr.prefix.ok_or_else(|| {
        syn::Error::new_spanned(&input, "Record requires #[record(prefix = \"abc\")]")
    })?;
    if prefix.value().len() > MAX_PREFIX_LEN {
        return Err(syn::Error::new(
            prefix.span(),
            format!("id prefix must be at most {MAX_PREFIX_LEN} characters"),
        ));
    }

    let mut base_field = None;
    let mut descriptors = Vec::new();
    let mut values = Vec::new();
    let mut extracts = Vec::new();
    let mut columns = HashSet::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_ty = &field.ty;
        let fattr = field_attr(&field.attrs)?;

        if fattr.base {
            if base_field.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field may be marked #[record(base)]",
                ));
            }
            base_field = Some(field_name);
            let embedded = field_name.to_string();
            descriptors.push(quote! { ::recsql::FieldDescriptor::embedded(#embedded) });
            extracts.push(quote! {
                #field_name: <#field_ty as ::recsql::FromRow>::from_row(row)?
            });
            continue;
        }

        if fattr.skip {
            extracts.push(quote! {
                #field_name: ::std::default::Default::default()
            });
            continue;
        }

        let column = fattr
            .column
            .map(|c| c.value())
            .unwrap_or_else(|| field_name.to_string());
        if !columns.insert(column.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate column {column:?}"),
            ));
        }

        descriptors.push(quote! { ::recsql::FieldDescriptor::column(#column) });
        extracts.push(quote! {
            #field_name: row.try_get_column(#column)?
        });
        if !SYSTEM_COLUMNS.contains(&column.as_str()) && !column.contains('.') {
            values.push(quote! {
                (#column, ::recsql::Value::new(::std::clone::Clone::clone(&self.#field_name)))
            });
        }
    }

    let base_field = base_field.ok_or_else(|| {
        syn::Error::new_spanned(&input, "Record requires a #[record(base)] field of type recsql::Base")
    })?;

    Ok(quote! {
        impl #impl_generics ::recsql::Record for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            const ID_PREFIX: &'static str = #prefix;

            fn descriptors() -> &'static [::recsql::FieldDescriptor] {
                const DESCRIPTORS: &[::recsql::FieldDescriptor] = &[#(#descriptors),*];
                DESCRIPTORS
            }

            fn values(&self) -> ::std::vec::Vec<(&'static str, ::recsql::Value)> {
                ::std::vec![#(#values),*]
            }

            fn base(&self) -> &::recsql::Base {
                &self.#base_field
            }

            fn base_mut(&mut self) -> &mut ::recsql::Base {
                &mut self.#base_field
            }
        }

        impl #impl_generics ::recsql::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::recsql::tokio_postgres::Row) -> ::recsql::OrmResult<Self> {
                use ::recsql::RowExt;
                Ok(Self {
                    #(#extracts),*
                })
            }
        }
    })
}
