//! Bind values and flattened column/value argument lists.

use crate::json::{ColumnRef, Json};
use std::any::Any;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A clone-friendly bind value.
///
/// The value is stored behind an `Arc` so a [`Query`](crate::Query) can be
/// cloned or shared without copying its parameters. Whether the value is
/// JSON-typed is decided once, at construction time; update templates use it
/// to pick the merge-patch assignment form.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn ToSql + Send + Sync>,
    json: bool,
}

impl Value {
    /// Create a new value from any ToSql value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        let json = is_json(&value);
        Value {
            inner: Arc::new(value),
            json,
        }
    }

    /// Whether the value is a JSON document ([`Json`] or `serde_json::Value`),
    /// optionally wrapped in `Option`.
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Get a reference to the inner value as a ToSql trait object.
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        &*self.inner as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("inner", &self.inner)
            .field("json", &self.json)
            .finish()
    }
}

fn is_json<T: 'static>(value: &T) -> bool {
    let any = value as &dyn Any;
    is_json_type::<Json>(any)
        || is_json_type::<serde_json::Value>(any)
        || is_json_type::<tokio_postgres::types::Json<serde_json::Value>>(any)
}

// `None` binds NULL in either assignment form, so optional documents merge too.
fn is_json_type<J: 'static>(any: &dyn Any) -> bool {
    any.is::<J>() || any.is::<Option<J>>()
}

/// One element of a flattened `(column, value, column, value, ...)` argument list.
///
/// Even positions must hold [`Arg::Column`], odd positions [`Arg::Value`].
/// Use [`args!`](crate::args) to build well-formed lists.
#[derive(Debug, Clone)]
pub enum Arg {
    Column(ColumnRef),
    Value(Value),
}

impl Arg {
    /// A column reference: a plain name or a [`JsonPath`](crate::JsonPath).
    pub fn column(column: impl Into<ColumnRef>) -> Self {
        Arg::Column(column.into())
    }

    /// A bind value.
    pub fn value<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Arg::Value(Value::new(value))
    }
}

/// Build a flattened argument list from `column => value` pairs.
///
/// ```ignore
/// let args = recsql::args!["id" => "usr-132", "age" => 18];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::column($column), $crate::Arg::value($value)),+]
    };
}
