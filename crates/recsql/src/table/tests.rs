use super::*;
use crate::args;
use crate::dialect::{MYSQL, POSTGRES};
use crate::fields::FieldDescriptor;
use crate::json::{Json, JsonPath};
use crate::record::Base;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct User {
    base: Base,
    name: String,
    age: i32,
    details: Json,
}

const USER_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::embedded("base"),
    FieldDescriptor::column("name"),
    FieldDescriptor::column("age"),
    FieldDescriptor::column("details"),
];

impl FromRow for User {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            base: Base::from_row(row)?,
            name: row.try_get_column("name")?,
            age: row.try_get_column("age")?,
            details: row.try_get_column("details")?,
        })
    }
}

impl Record for User {
    const TABLE: &'static str = "users";
    const ID_PREFIX: &'static str = "usr";

    fn descriptors() -> &'static [FieldDescriptor] {
        USER_FIELDS
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::new(self.name.clone())),
            ("age", Value::new(self.age)),
            ("details", Value::new(self.details.clone())),
        ]
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }
}

#[derive(Debug)]
struct FakeStmt {
    sql: String,
    released: Arc<AtomicUsize>,
}

impl Release for FakeStmt {
    fn release(&self) -> OrmResult<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connection that records what it runs and returns no rows.
#[derive(Default)]
struct FakeConn {
    dialect: Option<&'static str>,
    prepared: Mutex<Vec<String>>,
    released: Arc<AtomicUsize>,
    executed: Mutex<Vec<(String, usize)>>,
    affected: u64,
    delay: Option<Duration>,
}

impl FakeConn {
    fn affecting(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    fn prepared(&self) -> Vec<String> {
        self.prepared.lock().unwrap().clone()
    }

    fn executed(&self) -> Vec<(String, usize)> {
        self.executed.lock().unwrap().clone()
    }

    async fn run(&self, stmt: &FakeStmt, params: &[&(dyn ToSql + Sync)]) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.executed
            .lock()
            .unwrap()
            .push((stmt.sql.clone(), params.len()));
    }
}

impl Prepare for FakeConn {
    type Statement = FakeStmt;

    fn dialect(&self) -> &str {
        self.dialect.unwrap_or(POSTGRES)
    }

    async fn prepare_statement(&self, sql: &str) -> OrmResult<FakeStmt> {
        self.prepared.lock().unwrap().push(sql.to_string());
        Ok(FakeStmt {
            sql: sql.to_string(),
            released: Arc::clone(&self.released),
        })
    }
}

impl Connection for FakeConn {
    async fn query_prepared(
        &self,
        stmt: &FakeStmt,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Vec<Row>> {
        self.run(stmt, params).await;
        Ok(Vec::new())
    }

    async fn execute_prepared(
        &self,
        stmt: &FakeStmt,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<u64> {
        self.run(stmt, params).await;
        Ok(self.affected)
    }
}

async fn open(conn: FakeConn) -> Table<User, FakeConn> {
    Table::open(conn, TableConfig::new()).await.unwrap()
}

#[test]
fn config_defaults() {
    let config = TableConfig::new();
    assert!(config.statement_cache);
    assert!(config.query_timeout.is_none());
    assert!(config.id_prefix.is_none());
    assert!(config.dialect.is_none());
    assert!(config.registry.is_none());
}

#[test]
fn config_builder_chain() {
    let config = TableConfig::new()
        .no_statement_cache()
        .timeout(Duration::from_secs(3))
        .id_prefix("acct")
        .dialect(MYSQL);
    assert!(!config.statement_cache);
    assert_eq!(config.query_timeout, Some(Duration::from_secs(3)));
    assert_eq!(config.id_prefix.as_deref(), Some("acct"));
    assert_eq!(config.dialect.as_deref(), Some(MYSQL));
}

#[tokio::test]
async fn open_prepares_builtin_statements() {
    let table = open(FakeConn::default()).await;
    assert_eq!(
        table.connection().prepared(),
        vec![
            "INSERT INTO users (id, name, age, details) VALUES ($1, $2, $3, $4) RETURNING created_at, updated_at;",
            "SELECT * FROM users WHERE deleted_at IS NULL AND id = $1 ORDER BY created_at DESC;",
            "UPDATE users SET deleted_at = NOW() WHERE deleted_at IS NULL AND id = $1 RETURNING deleted_at;",
        ]
    );
    assert_eq!(table.cache_stats().installed, 3);
}

#[tokio::test]
async fn open_without_cache_prepares_nothing() {
    let table: Table<User, _> = Table::open(FakeConn::default(), TableConfig::new().no_statement_cache())
        .await
        .unwrap();
    assert!(table.connection().prepared().is_empty());
}

#[tokio::test]
async fn open_rejects_unknown_dialect() {
    let err = Table::<User, _>::open(FakeConn::default(), TableConfig::new().dialect("oracle"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::UnknownDialect(ref d) if d == "oracle"));
}

#[tokio::test]
async fn open_rejects_long_prefix() {
    let err = Table::<User, _>::open(FakeConn::default(), TableConfig::new().id_prefix("customer"))
        .await
        .unwrap_err();
    assert!(err.is_shape());
}

#[tokio::test]
async fn insert_assigns_id_and_binds_in_column_order() {
    let table = open(FakeConn::default()).await;
    let mut user = User {
        name: "John".into(),
        age: 18,
        ..User::default()
    };

    table.insert(&mut user).await.unwrap();

    assert!(user.base.id.starts_with("usr-"));
    let executed = table.connection().executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].0.starts_with("INSERT INTO users"));
    assert_eq!(executed[0].1, 4);
    // Served from the statement prepared at open.
    assert_eq!(table.connection().prepared().len(), 3);
}

#[tokio::test]
async fn insert_uses_configured_prefix() {
    let table: Table<User, _> = Table::open(FakeConn::default(), TableConfig::new().id_prefix("acct"))
        .await
        .unwrap();
    let mut user = User::default();
    table.insert(&mut user).await.unwrap();
    assert!(user.base.id.starts_with("acct-"));
}

#[tokio::test]
async fn get_missing_row_is_not_found() {
    let table = open(FakeConn::default()).await;
    let err = table.get("usr-missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn list_without_rows_is_empty() {
    let table = open(FakeConn::default()).await;
    let users = table.list(args!["age" => 18]).await.unwrap();
    assert!(users.is_empty());
    assert_eq!(
        table.connection().executed(),
        vec![(
            "SELECT * FROM users WHERE deleted_at IS NULL AND age = $1 ORDER BY created_at DESC;".to_string(),
            1
        )]
    );
}

#[tokio::test]
async fn list_rejects_unknown_column() {
    let table = open(FakeConn::default()).await;
    assert!(table.list(args!["email" => "a@b.c"]).await.unwrap_err().is_shape());
}

#[tokio::test]
async fn update_appends_identifier() {
    let table = open(FakeConn::affecting(1)).await;
    table
        .update(
            "usr-132",
            args!["age" => 19, JsonPath::object("details", ["key"]) => Json::object([("a", 1.into())])],
        )
        .await
        .unwrap();

    let executed = table.connection().executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].0.starts_with("UPDATE users SET updated_at = NOW(), age = $1, details->'key' = "));
    assert!(executed[0].0.ends_with("WHERE deleted_at IS NULL AND id = $3 RETURNING updated_at;"));
    assert_eq!(executed[0].1, 3);
}

#[tokio::test]
async fn update_requires_fields() {
    let table = open(FakeConn::affecting(1)).await;
    assert!(table.update("usr-132", args![]).await.unwrap_err().is_shape());
    assert!(table.connection().executed().is_empty());
}

#[tokio::test]
async fn update_rejects_system_columns() {
    let table = open(FakeConn::affecting(1)).await;
    for column in ["id", "created_at", "updated_at", "deleted_at"] {
        let err = table.update("usr-132", args![column => "x"]).await.unwrap_err();
        assert!(err.is_shape(), "{column}");
    }
}

#[tokio::test]
async fn update_without_match_is_not_found() {
    let table = open(FakeConn::affecting(0)).await;
    assert!(table.update("usr-132", args!["age" => 1]).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn delete_reports_missing_rows() {
    let table = open(FakeConn::affecting(0)).await;
    assert!(table.delete("usr-132").await.unwrap_err().is_not_found());

    let table = open(FakeConn::affecting(1)).await;
    table.delete("usr-132").await.unwrap();
}

#[tokio::test]
async fn repeated_shapes_reuse_statements() {
    let table = open(FakeConn::affecting(1)).await;
    for age in 0..5 {
        table.update("usr-132", args!["age" => age]).await.unwrap();
    }
    // Three statements from open plus one update shape.
    assert_eq!(table.connection().prepared().len(), 4);
    assert_eq!(table.cache_stats().hits, 4);
}

#[tokio::test]
async fn uncached_statements_are_released_after_use() {
    let table: Table<User, _> = Table::open(FakeConn::affecting(1), TableConfig::new().no_statement_cache())
        .await
        .unwrap();
    table.delete("usr-1").await.unwrap();
    table.delete("usr-2").await.unwrap();

    assert_eq!(table.connection().prepared().len(), 2);
    assert_eq!(table.connection().released.load(Ordering::SeqCst), 2);
    assert_eq!(table.cache_stats(), CacheStats::default());
}

#[tokio::test]
async fn uncached_statement_released_when_operation_times_out() {
    let conn = FakeConn {
        delay: Some(Duration::from_secs(5)),
        ..FakeConn::affecting(1)
    };
    let config = TableConfig::new()
        .no_statement_cache()
        .timeout(Duration::from_millis(20));
    let table: Table<User, _> = Table::open(conn, config).await.unwrap();

    assert!(table.delete("usr-1").await.unwrap_err().is_timeout());
    assert_eq!(table.connection().prepared().len(), 1);
    assert_eq!(table.connection().released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn update_rejects_changed_json_binding() {
    let table = open(FakeConn::affecting(1)).await;
    table
        .update("usr-1", args!["details" => Json::object([("a", 1.into())])])
        .await
        .unwrap();

    let err = table.update("usr-1", args!["details" => "plain"]).await.unwrap_err();
    assert!(err.is_shape());
    assert_eq!(table.connection().executed().len(), 1);

    // Same binding again is still served from the cache.
    table
        .update("usr-1", args!["details" => Json::object([("b", 2.into())])])
        .await
        .unwrap();
    assert_eq!(table.connection().executed().len(), 2);
}

#[tokio::test]
async fn update_without_cache_renders_each_json_binding() {
    let table: Table<User, _> = Table::open(FakeConn::affecting(1), TableConfig::new().no_statement_cache())
        .await
        .unwrap();
    table
        .update("usr-1", args!["details" => Json::object([("a", 1.into())])])
        .await
        .unwrap();
    table.update("usr-1", args!["details" => "plain"]).await.unwrap();

    let executed = table.connection().executed();
    assert!(executed[0].0.contains("'null'::jsonb"));
    assert!(executed[1].0.contains("details = $1"));
}

#[tokio::test]
async fn mysql_dialect_renders_mysql_templates() {
    let conn = FakeConn {
        dialect: Some(MYSQL),
        ..FakeConn::affecting(1)
    };
    let table: Table<User, _> = Table::open(conn, TableConfig::new()).await.unwrap();
    table.delete("usr-1").await.unwrap();
    assert_eq!(
        table.connection().executed()[0].0,
        "UPDATE users SET deleted_at = NOW() WHERE deleted_at IS NULL AND id = $1;"
    );
}

#[tokio::test]
async fn slow_operation_times_out() {
    let conn = FakeConn {
        delay: Some(Duration::from_secs(5)),
        ..FakeConn::affecting(1)
    };
    let table: Table<User, _> = Table::open(conn, TableConfig::new().timeout(Duration::from_millis(20)))
        .await
        .unwrap();
    assert!(table.delete("usr-1").await.unwrap_err().is_timeout());
}

#[tokio::test]
async fn close_releases_cached_statements() {
    let table = open(FakeConn::affecting(1)).await;
    table.close().unwrap();
    assert_eq!(table.connection().released.load(Ordering::SeqCst), 3);
}
