//! Query builder: argument validation, fingerprinting and rendering.
//!
//! ```ignore
//! use recsql::{args, QueryBuilder, TemplateName};
//!
//! let builder = QueryBuilder::for_record::<User>();
//! let q = builder.query("postgres", TemplateName::Select, args!["id" => "usr-132", "age" => 18])?;
//! assert_eq!(
//!     builder.build(&q)?,
//!     "SELECT * FROM users WHERE deleted_at IS NULL AND id = $1 AND age = $2 ORDER BY created_at DESC;"
//! );
//! ```

use crate::dialect::Registry;
use crate::error::{OrmError, OrmResult};
use crate::fields::{FieldSet, ID_COLUMN};
use crate::fingerprint::Fingerprint;
use crate::record::Record;
use crate::template::{RenderContext, TemplateName};
use crate::value::{Arg, Value};
use std::sync::Arc;
use tokio_postgres::types::ToSql;


/// A validated query shape plus its bind values.
#[derive(Debug, Clone)]
pub struct Query {
    fingerprint: Fingerprint,
    dialect: String,
    template: TemplateName,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Query {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn template(&self) -> TemplateName {
        self.template
    }

    /// Ordered column expressions.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Ordered bind values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Bind values as references for tokio-postgres.
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(Value::as_sql).collect()
    }
}

/// Compiles argument lists for one table into [`Query`] descriptors and SQL.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    registry: Arc<Registry>,
    fields: FieldSet,
    table: String,
}

impl QueryBuilder {
    /// Create a builder over the shared default registry.
    pub fn new(table: impl Into<String>, fields: FieldSet) -> Self {
        Self {
            registry: Registry::shared(),
            fields,
            table: table.into(),
        }
    }

    /// Create a builder for a record type.
    pub fn for_record<R: Record>() -> Self {
        Self::new(R::TABLE, FieldSet::of::<R>())
    }

    /// Use a custom template registry.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validate a flattened `(column, value, ...)` list and fingerprint its shape.
    ///
    /// Fails with a shape error when the list has odd length, when a column
    /// slot holds a value (or the reverse), or when a column is neither `id`
    /// nor part of the field set. The dialect is not checked here; see
    /// [`QueryBuilder::build`].
    pub fn query(&self, dialect: &str, template: TemplateName, args: Vec<Arg>) -> OrmResult<Query> {
        let (columns, values) = self.split(args)?;
        let fingerprint = Fingerprint::compute(dialect, template.as_str(), &columns);

        Ok(Query {
            fingerprint,
            dialect: dialect.to_string(),
            template,
            columns,
            values,
        })
    }

    /// Render the SQL for a query with its dialect's template.
    pub fn build(&self, query: &Query) -> OrmResult<String> {
        let set = self
            .registry
            .get(&query.dialect)
            .ok_or_else(|| OrmError::UnknownDialect(query.dialect.clone()))?;

        let ctx = RenderContext {
            table: &self.table,
            fields: &self.fields,
            columns: &query.columns,
            values: &query.values,
        };

        set.render(query.template, &ctx)
            .map_err(|message| OrmError::Render {
                template: query.template.as_str(),
                dialect: query.dialect.clone(),
                message,
            })
    }

    fn split(&self, args: Vec<Arg>) -> OrmResult<(Vec<String>, Vec<Value>)> {
        if args.len() % 2 != 0 {
            return Err(OrmError::shape(format!(
                "args length is not even ({})",
                args.len()
            )));
        }

        let mut columns = Vec::with_capacity(args.len() / 2);
        let mut values = Vec::with_capacity(args.len() / 2);
        let mut args = args.into_iter().enumerate();

        while let (Some((i, column)), Some((j, value))) = (args.next(), args.next()) {
            let column = match column {
                Arg::Column(column) => column,
                Arg::Value(value) => {
                    return Err(OrmError::shape(format!(
                        "invalid {i} field: expected a column, got {value:?}"
                    )));
                }
            };
            let value = match value {
                Arg::Value(value) => value,
                Arg::Column(column) => {
                    return Err(OrmError::shape(format!(
                        "invalid {j} value: expected a value, got column {:?}",
                        column.column()
                    )));
                }
            };

            let name = column.column();
            if name != ID_COLUMN && !self.fields.contains(name) {
                return Err(OrmError::shape(format!("invalid {i} field {name:?}")));
            }

            columns.push(column.expr());
            values.push(value);
        }

        Ok((columns, values))
    }
}
