//! JSON documents and JSON-path column references.
//!
//! A column reference is either a plain column name or a [`JsonPath`]: a
//! column followed by one or more nested keys. Paths compile to accessor
//! expressions using `->` for interior steps and, for the final step, either
//! `->` (object access) or `->>` (text extraction):
//!
//! ```ignore
//! use recsql::JsonPath;
//!
//! assert_eq!(JsonPath::text("foo", ["bar", "baz", "qux"]).expr(), "foo->'bar'->'baz'->>'qux'");
//! assert_eq!(JsonPath::object("details", ["key"]).expr(), "details->'key'");
//! ```

use crate::error::{OrmError, OrmResult};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};

/// A JSON document bound as a `json`/`jsonb` parameter.
///
/// Values of this type select the merge-patch form in update statements.
/// Equality is structural (object key order does not matter).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Json(pub serde_json::Value);

impl Json {
    /// Build a JSON object from key/value pairs.
    pub fn object<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Json(serde_json::Value::Object(
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Build a JSON array.
    pub fn array(items: impl IntoIterator<Item = serde_json::Value>) -> Self {
        Json(serde_json::Value::Array(items.into_iter().collect()))
    }

    /// Serialize any value into a JSON document.
    pub fn text<T: Serialize>(value: &T) -> OrmResult<Self> {
        serde_json::to_value(value)
            .map(Json)
            .map_err(|e| OrmError::shape(format!("value is not representable as JSON: {e}")))
    }

    /// Deserialize the document into a typed value.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> OrmResult<T> {
        serde_json::from_value(self.0.clone()).map_err(|e| OrmError::decode("json", e.to_string()))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl From<serde_json::Value> for Json {
    fn from(value: serde_json::Value) -> Self {
        Json(value)
    }
}

impl ToSql for Json {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        self.0.to_sql(ty, out)
    }

    fn accepts(ty: &Type) -> bool {
        <serde_json::Value as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Json {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        serde_json::Value::from_sql(ty, raw).map(Json)
    }

    fn accepts(ty: &Type) -> bool {
        <serde_json::Value as FromSql>::accepts(ty)
    }
}

/// Operator used for the final step of a [`JsonPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// `->`: the result stays a JSON value.
    Object,
    /// `->>`: the result is extracted as text.
    Text,
}

impl Access {
    fn last_op(self) -> &'static str {
        match self {
            Access::Object => "->",
            Access::Text => "->>",
        }
    }
}

const STEP_OP: &str = "->";

/// A nested JSON key path rooted at a column.
///
/// The column is always the first element; a path therefore can never be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    column: String,
    keys: Vec<String>,
    access: Access,
}

impl JsonPath {
    /// Path whose final step uses the object-access operator (`->`).
    pub fn object<K: Into<String>>(column: impl Into<String>, keys: impl IntoIterator<Item = K>) -> Self {
        Self::new(column, keys, Access::Object)
    }

    /// Path whose final step uses the text-extraction operator (`->>`).
    pub fn text<K: Into<String>>(column: impl Into<String>, keys: impl IntoIterator<Item = K>) -> Self {
        Self::new(column, keys, Access::Text)
    }

    pub fn new<K: Into<String>>(
        column: impl Into<String>,
        keys: impl IntoIterator<Item = K>,
        access: Access,
    ) -> Self {
        Self {
            column: column.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            access,
        }
    }

    /// Build a path from raw segments (`[column, key, key, ...]`).
    ///
    /// Fails with a shape error when `segments` is empty.
    pub fn from_segments<S: Into<String>>(
        segments: impl IntoIterator<Item = S>,
        access: Access,
    ) -> OrmResult<Self> {
        let mut segments = segments.into_iter().map(Into::into);
        let column = segments
            .next()
            .ok_or_else(|| OrmError::shape("empty JSON path"))?;
        Ok(Self {
            column,
            keys: segments.collect(),
            access,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Render the accessor expression.
    ///
    /// A path without keys renders as the bare column. Keys are quoted as
    /// string literals after [`strip_quotes`]; see its docs for what that
    /// does and does not guarantee.
    pub fn expr(&self) -> String {
        let mut out = String::with_capacity(
            self.column.len() + self.keys.iter().map(|k| k.len() + 5).sum::<usize>(),
        );
        out.push_str(&self.column);
        let last = self.keys.len().saturating_sub(1);
        for (i, key) in self.keys.iter().enumerate() {
            out.push_str(if i == last {
                self.access.last_op()
            } else {
                STEP_OP
            });
            out.push('\'');
            out.push_str(&strip_quotes(key));
            out.push('\'');
        }
        out
    }
}

/// Remove single and double quote characters from a JSON key.
///
/// This only keeps the rendered `'key'` literal well-formed for ordinary
/// keys. It is not an escaping scheme: other SQL metacharacters pass through
/// untouched, so keys taken from untrusted input must be validated by the
/// caller before they reach a [`JsonPath`].
pub fn strip_quotes(key: &str) -> String {
    key.chars().filter(|c| !matches!(c, '\'' | '"')).collect()
}

/// A column reference: a plain column name or a JSON path into a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    Name(String),
    Path(JsonPath),
}

impl ColumnRef {
    /// The underlying column (used for validation against the field set).
    pub fn column(&self) -> &str {
        match self {
            ColumnRef::Name(name) => name,
            ColumnRef::Path(path) => path.column(),
        }
    }

    /// The render-ready expression.
    pub fn expr(&self) -> String {
        match self {
            ColumnRef::Name(name) => name.clone(),
            ColumnRef::Path(path) => path.expr(),
        }
    }

    /// Compile to `(column, expression)`.
    pub fn compile(&self) -> (String, String) {
        (self.column().to_string(), self.expr())
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        ColumnRef::Name(name)
    }
}

impl From<&String> for ColumnRef {
    fn from(name: &String) -> Self {
        ColumnRef::Name(name.clone())
    }
}

impl From<JsonPath> for ColumnRef {
    fn from(path: JsonPath) -> Self {
        ColumnRef::Path(path)
    }
}
