//! Derive macros for recsql
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attr;
mod record;

/// Derive `Record` and `FromRow` for a struct.
///
/// # Example
///
/// ```ignore
/// use recsql::{Base, Json, Record};
///
/// #[derive(Record)]
/// #[record(table = "users", prefix = "usr")]
/// struct User {
///     #[record(base)]
///     base: Base,
///     name: String,
///     #[record(column = "years")]
///     age: i32,
///     details: Json,
///     #[record(skip)]
///     cached_label: String,
/// }
/// ```
///
/// # Attributes
///
/// - `#[record(table = "name", prefix = "abc")]` - Table name and identifier prefix (required)
/// - `#[record(base)]` - The embedded [`Base`] holding the system columns (required, once)
/// - `#[record(column = "name")]` - Map field to a different column name
/// - `#[record(skip)]` - Not a column; filled with `Default::default()` when decoding
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
