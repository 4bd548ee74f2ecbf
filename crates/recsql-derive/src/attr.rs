//! `#[record(...)]` attribute parsing.

use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Ident, LitStr, Result, Token};

/// Struct-level `#[record(table = "...", prefix = "...")]`.
#[derive(Default)]
pub struct RecordAttr {
    pub table: Option<LitStr>,
    pub prefix: Option<LitStr>,
}

impl Parse for RecordAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = RecordAttr::default();

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            let _: Token![=] = input.parse()?;
            let value: LitStr = input.parse()?;

            if key == "table" {
                attr.table = Some(value);
            } else if key == "prefix" {
                attr.prefix = Some(value);
            } else {
                return Err(syn::Error::new(key.span(), "expected `table` or `prefix`"));
            }

            if input.is_empty() {
                break;
            }
            let _: Token![,] = input.parse()?;
        }

        Ok(attr)
    }
}

/// Field-level `#[record(base)]`, `#[record(skip)]` or `#[record(column = "...")]`.
#[derive(Default)]
pub struct FieldAttr {
    pub base: bool,
    pub skip: bool,
    pub column: Option<LitStr>,
}

impl Parse for FieldAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            if key == "base" {
                attr.base = true;
            } else if key == "skip" {
                attr.skip = true;
            } else if key == "column" {
                let _: Token![=] = input.parse()?;
                attr.column = Some(input.parse()?);
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    "expected `base`, `skip` or `column = \"...\"`",
                ));
            }

            if input.is_empty() {
                break;
            }
            let _: Token![,] = input.parse()?;
        }

        Ok(attr)
    }
}

/// Merge every `#[record(...)]` attribute in `attrs`.
pub fn record_attr(attrs: &[Attribute]) -> Result<RecordAttr> {
    let mut merged = RecordAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("record")) {
        let parsed: RecordAttr = attr.parse_args()?;
        merged.table = parsed.table.or(merged.table);
        merged.prefix = parsed.prefix.or(merged.prefix);
    }
    Ok(merged)
}

pub fn field_attr(attrs: &[Attribute]) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("record")) {
        let parsed: FieldAttr = attr.parse_args()?;
        merged.base |= parsed.base;
        merged.skip |= parsed.skip;
        merged.column = parsed.column.or(merged.column);
    }
    Ok(merged)
}
