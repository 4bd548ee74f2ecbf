//! Per-table prepared statement cache.
//!
//! Statements are keyed by [`Fingerprint`]. The first caller of a shape
//! renders and prepares it; later callers reuse the installed handle. Callers
//! that race on the same cold shape may each prepare a statement, but only
//! one is installed: the others are released before `prepare` returns and
//! every caller receives the installed handle.

use crate::builder::{Query, QueryBuilder};
use crate::error::{OrmError, OrmResult};
use crate::fingerprint::Fingerprint;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};


/// A prepared statement handle that can be released.
pub trait Release: Send + Sync + 'static {
    fn release(&self) -> OrmResult<()>;
}

/// A connection that can prepare statements.
pub trait Prepare: Send + Sync {
    type Statement: Release;

    /// Dialect identifier used to pick templates for this connection.
    fn dialect(&self) -> &str;

    /// Prepare a statement on the connection.
    fn prepare_statement(
        &self,
        sql: &str,
    ) -> impl Future<Output = OrmResult<Self::Statement>> + Send;
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by an installed handle.
    pub hits: u64,
    /// Lookups that had to prepare a statement.
    pub misses: u64,
    /// Handles installed.
    pub installed: u64,
    /// Duplicate handles released after losing an install race.
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    installed: AtomicU64,
    discarded: AtomicU64,
}

/// Fingerprint → prepared statement map with at-most-one handle per fingerprint.
pub struct StatementCache<S> {
    map: DashMap<Fingerprint, Arc<S>>,
    deferred: Mutex<Vec<OrmError>>,
    counters: Counters,
}

impl<S> Default for StatementCache<S> {
    fn default() -> Self {
        Self {
            map: DashMap::new(),
            deferred: Mutex::new(Vec::new()),
            counters: Counters::default(),
        }
    }
}

impl<S> std::fmt::Debug for StatementCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCache")
            .field("len", &self.map.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S> StatementCache<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Installed handle for a fingerprint, if any.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<S>> {
        self.map.get(fingerprint).map(|entry| Arc::clone(entry.value()))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            installed: self.counters.installed.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }
}

impl<S: Release> StatementCache<S> {
    /// Get or prepare the statement for `query`, rendering it with `builder`.
    ///
    /// Lookups are keyed by the query's fingerprint, which ignores bind
    /// values. Whether a value is JSON changes the rendered update but not
    /// the fingerprint, so the statement prepared first for a shape is reused
    /// for every later binding of it. [`Table::update`](crate::Table::update)
    /// rejects such mismatches.
    pub async fn prepare<C>(
        &self,
        conn: &C,
        builder: &QueryBuilder,
        query: &Query,
    ) -> OrmResult<Arc<S>>
    where
        C: Prepare<Statement = S>,
    {
        self.prepare_with(conn, query, |q| builder.build(q)).await
    }

    /// Get or prepare the statement for `query`, rendering it with `render`.
    ///
    /// `render` runs only on a miss; see [`StatementCache::prepare`].
    pub async fn prepare_with<C, F>(&self, conn: &C, query: &Query, render: F) -> OrmResult<Arc<S>>
    where
        C: Prepare<Statement = S>,
        F: FnOnce(&Query) -> OrmResult<String>,
    {
        let fingerprint = *query.fingerprint();

        if let Some(stmt) = self.get(&fingerprint) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stmt);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let sql = render(query)?;

        tracing::debug!(
            target: "recsql.sql",
            dialect = %query.dialect(),
            template = %query.template(),
            fingerprint = %fingerprint,
            sql = %sql,
            "preparing statement"
        );

        let stmt = conn
            .prepare_statement(&sql)
            .await
            .map_err(|e| OrmError::prepare(sql, e))?;

        Ok(self.install(fingerprint, Arc::new(stmt)))
    }

    /// Install `stmt` unless a handle already exists; returns the surviving handle.
    fn install(&self, fingerprint: Fingerprint, stmt: Arc<S>) -> Arc<S> {
        let (winner, loser) = match self.map.entry(fingerprint) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), Some(stmt)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&stmt));
                (stmt, None)
            }
        };

        match loser {
            Some(loser) => {
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    target: "recsql.sql",
                    fingerprint = %fingerprint,
                    "discarding duplicate statement"
                );
                if let Err(e) = loser.release() {
                    tracing::warn!(
                        target: "recsql.sql",
                        fingerprint = %fingerprint,
                        error = %e,
                        "failed to release duplicate statement"
                    );
                    self.defer(e);
                }
            }
            None => {
                self.counters.installed.fetch_add(1, Ordering::Relaxed);
            }
        }

        winner
    }

    fn defer(&self, err: OrmError) {
        match self.deferred.lock() {
            Ok(mut deferred) => deferred.push(err),
            Err(poisoned) => poisoned.into_inner().push(err),
        }
    }

    /// Release every installed handle.
    ///
    /// All release failures, including those recorded while discarding race
    /// losers, are joined into the returned error.
    pub fn close(&self) -> OrmResult<()> {
        let mut errors = match self.deferred.lock() {
            Ok(mut deferred) => std::mem::take(&mut *deferred),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let keys: Vec<Fingerprint> = self.map.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, stmt)) = self.map.remove(&key) {
                if let Err(e) = stmt.release() {
                    errors.push(e);
                }
            }
        }

        match OrmError::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
