//! Record types and the system-managed base columns.

use crate::error::OrmResult;
use crate::fields::FieldDescriptor;
use crate::row::{FromRow, RowExt};
use crate::value::Value;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;

/// System-managed columns shared by every record.
///
/// Embed it in a record with `#[record(base)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Base {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FromRow for Base {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            id: row.try_get_column("id")?,
            created_at: row.try_get_column("created_at")?,
            updated_at: row.try_get_column("updated_at")?,
            deleted_at: row.try_get_column("deleted_at")?,
        })
    }
}

/// A persistable record type.
///
/// Implemented by `#[derive(Record)]`:
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
///     age: i32,
///     details: Json,
/// }
/// ```
pub trait Record: FromRow + Send + Sync + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Identifier prefix (at most 7 characters).
    const ID_PREFIX: &'static str;

    /// Declared fields, in declaration order.
    fn descriptors() -> &'static [FieldDescriptor];

    /// Persistable column values keyed by column name, in field-set order.
    fn values(&self) -> Vec<(&'static str, Value)>;

    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;
}
