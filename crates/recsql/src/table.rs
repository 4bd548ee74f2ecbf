//! Record table: insert, get, list, update and soft-delete over one connection.
//!
//! ```ignore
//! use recsql::{args, Table, TableConfig};
//!
//! let client = recsql::connect(&database_url).await?;
//! let users: Table<User, _> = Table::open(client, TableConfig::new()).await?;
//!
//! let mut user = User { name: "John".into(), age: 18, ..Default::default() };
//! users.insert(&mut user).await?;
//! users.update(&user.base.id, args!["age" => 19]).await?;
//! let adults = users.list(args!["age" => 19]).await?;
//! users.close()?;
//! ```

mod config;

pub use config::TableConfig;

use crate::builder::{Query, QueryBuilder};
use crate::cache::{CacheStats, Prepare, Release, StatementCache};
use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::fields::{ID_COLUMN, is_system_column};
use crate::fingerprint::Fingerprint;
use crate::id::{check_prefix, id};
use crate::named;
use crate::record::Record;
use crate::row::{FromRow, RowExt};
use crate::template::TemplateName;
use crate::value::{Arg, Value};
use dashmap::DashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

#[cfg(test)]
mod tests;

/// Typed access to the rows of one record table.
pub struct Table<R, C: Connection> {
    conn: C,
    builder: QueryBuilder,
    cache: StatementCache<C::Statement>,
    config: TableConfig,
    dialect: String,
    prefix: String,
    insert_names: Vec<String>,
    /// JSON-ness of each bound value, per cached update shape.
    update_bindings: DashMap<Fingerprint, Vec<bool>>,
    _record: PhantomData<fn() -> R>,
}

/// A statement handle for one operation.
///
/// Uncached handles are released by [`Prepared::finish`], or on drop when the
/// operation is abandoned (for example by a timeout).
struct Prepared<S: Release> {
    stmt: Arc<S>,
    cached: bool,
    released: bool,
}

impl<S: Release> Prepared<S> {
    fn cached(stmt: Arc<S>) -> Self {
        Self {
            stmt,
            cached: true,
            released: false,
        }
    }

    fn uncached(stmt: S) -> Self {
        Self {
            stmt: Arc::new(stmt),
            cached: false,
            released: false,
        }
    }

    /// Release an uncached handle, keeping the operation's error first.
    fn finish<T>(mut self, result: OrmResult<T>) -> OrmResult<T> {
        if self.cached {
            return result;
        }
        self.released = true;
        let released = self.stmt.release();
        let value = result?;
        released.map(|()| value)
    }
}

impl<S: Release> Drop for Prepared<S> {
    fn drop(&mut self) {
        if self.cached || self.released {
            return;
        }
        if let Err(e) = self.stmt.release() {
            tracing::warn!(
                target: "recsql.sql",
                error = %e,
                "failed to release abandoned statement"
            );
        }
    }
}

impl<R: Record, C: Connection> Table<R, C> {
    /// Open a table over `conn`.
    ///
    /// Fails when the dialect has no templates, when the identifier prefix is
    /// too long, or when the record declares no writable columns. With the
    /// statement cache enabled, the insert, get and delete statements are
    /// prepared up front.
    pub async fn open(conn: C, config: TableConfig) -> OrmResult<Self> {
        let prefix = config
            .id_prefix
            .clone()
            .unwrap_or_else(|| R::ID_PREFIX.to_string());
        check_prefix(&prefix)?;

        let dialect = config
            .dialect
            .clone()
            .unwrap_or_else(|| conn.dialect().to_string());

        let mut builder = QueryBuilder::for_record::<R>();
        if let Some(registry) = &config.registry {
            builder = builder.with_registry(Arc::clone(registry));
        }
        if !builder.registry().contains(&dialect) {
            return Err(OrmError::UnknownDialect(dialect));
        }
        if builder.fields().is_empty() {
            return Err(OrmError::shape(format!(
                "record for table {:?} has no writable fields",
                R::TABLE
            )));
        }

        let insert = builder.query(&dialect, TemplateName::Insert, Vec::new())?;
        let insert_names = named::compile(&builder.build(&insert)?).names;

        let table = Self {
            conn,
            builder,
            cache: StatementCache::new(),
            config,
            dialect,
            prefix,
            insert_names,
            update_bindings: DashMap::new(),
            _record: PhantomData,
        };
        table.init().await?;
        Ok(table)
    }

    async fn init(&self) -> OrmResult<()> {
        let statements = [
            (TemplateName::Insert, Vec::new()),
            (TemplateName::Select, crate::args![ID_COLUMN => String::new()]),
            (TemplateName::Delete, crate::args![ID_COLUMN => String::new()]),
        ];

        for (template, args) in statements {
            let query = self.builder.query(&self.dialect, template, args)?;
            let sql = self.render(&query)?;
            tracing::info!(
                target: "recsql.sql",
                table = %self.name(),
                template = %template,
                sql = %sql,
                "init table"
            );
            if self.config.statement_cache {
                self.cache
                    .prepare_with(&self.conn, &query, |q| self.render(q))
                    .await?;
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.builder.table()
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Insert a record under a freshly generated identifier.
    ///
    /// The identifier is written into the record's base before the statement
    /// runs. Timestamps returned by the database are copied back.
    pub async fn insert(&self, record: &mut R) -> OrmResult<()> {
        self.with_timeout(self.insert_inner(record)).await
    }

    async fn insert_inner(&self, record: &mut R) -> OrmResult<()> {
        record.base_mut().id = id(&self.prefix)?;

        let mut values = record.values();
        values.push((ID_COLUMN, Value::new(record.base().id.clone())));

        let params = self
            .insert_names
            .iter()
            .map(|name| {
                values
                    .iter()
                    .find(|(column, _)| *column == name.as_str())
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| OrmError::shape(format!("no value for field {name:?}")))
            })
            .collect::<OrmResult<Vec<Value>>>()?;
        let params: Vec<&(dyn ToSql + Sync)> = params.iter().map(Value::as_sql).collect();

        let query = self
            .builder
            .query(&self.dialect, TemplateName::Insert, Vec::new())?;
        let prepared = self.statement(&query).await?;
        let rows = self.conn.query_prepared(&prepared.stmt, &params).await;
        let rows = prepared.finish(rows)?;

        if let Some(row) = rows.first() {
            let base = record.base_mut();
            base.created_at = row.try_get_column("created_at")?;
            base.updated_at = row.try_get_column("updated_at")?;
        }
        Ok(())
    }

    /// Fetch a live record by identifier.
    pub async fn get(&self, id: &str) -> OrmResult<R> {
        self.with_timeout(async {
            let rows = self
                .query(TemplateName::Select, crate::args![ID_COLUMN => id.to_string()])
                .await?;
            match rows.first() {
                Some(row) => R::from_row(row),
                None => Err(OrmError::not_found(format!("{} {id:?}", self.name()))),
            }
        })
        .await
    }

    /// List live records matching every `column => value` filter, newest first.
    pub async fn list(&self, args: Vec<Arg>) -> OrmResult<Vec<R>> {
        self.with_timeout(async {
            let rows = self.query(TemplateName::Select, args).await?;
            rows.iter().map(R::from_row).collect()
        })
        .await
    }

    /// Update columns of a live record.
    ///
    /// JSON values are merged into the stored document rather than replacing
    /// it. System columns cannot be updated.
    ///
    /// Statements are cached by column shape, not by value, so with the
    /// statement cache enabled each column must be bound with the same
    /// JSON-ness on every call of that shape. A mismatch is a shape error.
    pub async fn update(&self, id: &str, mut args: Vec<Arg>) -> OrmResult<()> {
        if args.is_empty() {
            return Err(OrmError::shape("no fields to update"));
        }
        for (i, arg) in args.iter().enumerate().step_by(2) {
            if let Arg::Column(column) = arg {
                if is_system_column(column.column()) {
                    return Err(OrmError::shape(format!(
                        "cannot update {i} field {:?}",
                        column.column()
                    )));
                }
            }
        }
        args.push(Arg::column(ID_COLUMN));
        args.push(Arg::value(id.to_string()));

        let query = self.builder.query(&self.dialect, TemplateName::Update, args)?;
        self.check_bindings(&query)?;

        self.with_timeout(async {
            let n = self.execute_query(&query).await?;
            if n == 0 {
                return Err(OrmError::not_found(format!("{} {id:?}", self.name())));
            }
            Ok(())
        })
        .await
    }

    /// Soft-delete a live record.
    pub async fn delete(&self, id: &str) -> OrmResult<()> {
        self.with_timeout(async {
            let n = self
                .execute(TemplateName::Delete, crate::args![ID_COLUMN => id.to_string()])
                .await?;
            if n == 0 {
                return Err(OrmError::not_found(format!("{} {id:?}", self.name())));
            }
            Ok(())
        })
        .await
    }

    /// Release every cached statement.
    pub fn close(&self) -> OrmResult<()> {
        self.cache.close()
    }

    async fn query(&self, template: TemplateName, args: Vec<Arg>) -> OrmResult<Vec<Row>> {
        let query = self.builder.query(&self.dialect, template, args)?;
        let prepared = self.statement(&query).await?;
        let rows = self
            .conn
            .query_prepared(&prepared.stmt, &query.params())
            .await;
        prepared.finish(rows)
    }

    async fn execute(&self, template: TemplateName, args: Vec<Arg>) -> OrmResult<u64> {
        let query = self.builder.query(&self.dialect, template, args)?;
        self.execute_query(&query).await
    }

    async fn execute_query(&self, query: &Query) -> OrmResult<u64> {
        let prepared = self.statement(query).await?;
        let n = self
            .conn
            .execute_prepared(&prepared.stmt, &query.params())
            .await;
        prepared.finish(n)
    }

    /// Reject a cached shape bound with different JSON-ness than its first use.
    fn check_bindings(&self, query: &Query) -> OrmResult<()> {
        if !self.config.statement_cache {
            return Ok(());
        }
        let bindings: Vec<bool> = query.values().iter().map(Value::is_json).collect();
        let first = self
            .update_bindings
            .entry(*query.fingerprint())
            .or_insert_with(|| bindings.clone());
        let mismatch = first
            .iter()
            .zip(&bindings)
            .position(|(a, b)| a != b);
        match mismatch {
            Some(i) => Err(OrmError::shape(format!(
                "column {:?} was first updated with {} value",
                query.columns()[i],
                if first[i] { "a JSON" } else { "a non-JSON" }
            ))),
            None => Ok(()),
        }
    }

    fn render(&self, query: &Query) -> OrmResult<String> {
        let sql = self.builder.build(query)?;
        match query.template() {
            TemplateName::Insert => Ok(named::compile(&sql).sql),
            _ => Ok(sql),
        }
    }

    async fn statement(&self, query: &Query) -> OrmResult<Prepared<C::Statement>> {
        if self.config.statement_cache {
            let stmt = self
                .cache
                .prepare_with(&self.conn, query, |q| self.render(q))
                .await?;
            return Ok(Prepared::cached(stmt));
        }

        let sql = self.render(query)?;
        tracing::debug!(
            target: "recsql.sql",
            table = %self.name(),
            template = %query.template(),
            sql = %sql,
            "preparing uncached statement"
        );
        let stmt = self
            .conn
            .prepare_statement(&sql)
            .await
            .map_err(|e| OrmError::prepare(sql, e))?;
        Ok(Prepared::uncached(stmt))
    }

    async fn with_timeout<T, F>(&self, future: F) -> OrmResult<T>
    where
        F: Future<Output = OrmResult<T>>,
    {
        match self.config.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Some(cancel_token) = self.conn.cancel_token() {
                        tokio::spawn(async move {
                            let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                        });
                    }
                    Err(OrmError::Timeout(timeout))
                }
            },
            None => future.await,
        }
    }
}

impl<R, C: Connection> std::fmt::Debug for Table<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.builder.table())
            .field("dialect", &self.dialect)
            .field("prefix", &self.prefix)
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}
