//! Dialect template registry.
//!
//! A [`Registry`] maps dialect identifiers to parsed [`TemplateSet`]s. It is
//! built once and never mutated afterwards; builders share it through an
//! `Arc`. [`Registry::shared`] returns the process-wide default registry
//! holding the built-in `mysql` and `postgres` dialects.
//!
//! Adding a dialect means adding a [`TemplateSource`] row:
//!
//! ```ignore
//! use recsql::{Registry, TemplateSource};
//!
//! let registry = Registry::builder()
//!     .with_defaults()
//!     .register("sqlite", &TemplateSource { /* ... */ })?
//!     .build();
//! ```

use crate::error::OrmResult;
use crate::template::{TemplateSet, TemplateSource};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub const MYSQL: &str = "mysql";
pub const POSTGRES: &str = "postgres";

/// Built-in MySQL templates.
pub const MYSQL_TEMPLATES: TemplateSource<'static> = TemplateSource {
    select: "SELECT * FROM {table} WHERE deleted_at IS NULL{filters} ORDER BY created_at DESC;",
    insert: "INSERT INTO {table} (id, {fields}) VALUES (:id, {named_fields});",
    update: "UPDATE {table} SET updated_at = NOW(){assignments} WHERE deleted_at IS NULL AND id = {id_param};",
    delete: "UPDATE {table} SET deleted_at = NOW() WHERE deleted_at IS NULL AND id = $1;",
    merge: "{column} = JSON_MERGE_PATCH({column}, {param})",
};

/// Built-in PostgreSQL templates.
pub const POSTGRES_TEMPLATES: TemplateSource<'static> = TemplateSource {
    select: "SELECT * FROM {table} WHERE deleted_at IS NULL{filters} ORDER BY created_at DESC;",
    insert: "INSERT INTO {table} (id, {fields}) VALUES (:id, {named_fields}) RETURNING created_at, updated_at;",
    update: "UPDATE {table} SET updated_at = NOW(){assignments} WHERE deleted_at IS NULL AND id = {id_param} RETURNING updated_at;",
    delete: "UPDATE {table} SET deleted_at = NOW() WHERE deleted_at IS NULL AND id = $1 RETURNING deleted_at;",
    merge: "{column} = (CASE WHEN {column} = 'null'::jsonb THEN '{{}}'::jsonb ELSE {column} END) || (CASE WHEN {param} = 'null'::jsonb THEN '{{}}'::jsonb ELSE {param} END)",
};

static SHARED: LazyLock<Arc<Registry>> = LazyLock::new(|| {
    Arc::new(
        Registry::builder()
            .with_defaults()
            .build(),
    )
});

/// Immutable map of dialect identifier to template set.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sets: HashMap<String, TemplateSet>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The process-wide registry with the built-in dialects.
    pub fn shared() -> Arc<Registry> {
        Arc::clone(&SHARED)
    }

    pub fn get(&self, dialect: &str) -> Option<&TemplateSet> {
        self.sets.get(dialect)
    }

    pub fn contains(&self, dialect: &str) -> bool {
        self.sets.contains_key(dialect)
    }

    /// Registered dialect identifiers, sorted.
    pub fn dialects(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Collects template sets before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    sets: HashMap<String, TemplateSet>,
}

impl RegistryBuilder {
    /// Register (or replace) the templates for a dialect.
    pub fn register(mut self, dialect: impl Into<String>, source: &TemplateSource<'_>) -> OrmResult<Self> {
        let set = TemplateSet::parse(source)?;
        self.sets.insert(dialect.into(), set);
        Ok(self)
    }

    /// Register the built-in `mysql` and `postgres` dialects.
    ///
    /// # Panics
    ///
    /// Panics if a built-in template source is malformed.
    pub fn with_defaults(mut self) -> Self {
        for (dialect, source) in [(MYSQL, &MYSQL_TEMPLATES), (POSTGRES, &POSTGRES_TEMPLATES)] {
            let set = TemplateSet::parse(source)
                .unwrap_or_else(|e| panic!("built-in {dialect} templates: {e}"));
            self.sets.insert(dialect.to_string(), set);
        }
        self
    }

    pub fn build(self) -> Registry {
        Registry { sets: self.sets }
    }
}
