use crate::dialect::Registry;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for [`Table`](super::Table).
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Whether prepared statements are cached per query shape.
    pub statement_cache: bool,
    /// Timeout applied to each table operation.
    pub query_timeout: Option<Duration>,
    /// Identifier prefix; defaults to the record's declared prefix.
    pub id_prefix: Option<String>,
    /// Dialect identifier; defaults to the connection's dialect.
    pub dialect: Option<String>,
    /// Template registry; defaults to [`Registry::shared`].
    pub registry: Option<Arc<Registry>>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            statement_cache: true,
            query_timeout: None,
            id_prefix: None,
            dialect: None,
            registry: None,
        }
    }
}

impl TableConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the prepared statement cache.
    ///
    /// With the cache disabled every operation prepares a fresh statement
    /// and releases it afterwards.
    pub fn statement_cache(mut self, enabled: bool) -> Self {
        self.statement_cache = enabled;
        self
    }

    /// Disable prepared statement caching.
    pub fn no_statement_cache(self) -> Self {
        self.statement_cache(false)
    }

    /// Set query timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.query_timeout = Some(duration);
        self
    }

    /// Override the record's identifier prefix.
    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Override the connection's dialect identifier.
    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = Some(dialect.into());
        self
    }

    /// Use a custom template registry.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }
}
