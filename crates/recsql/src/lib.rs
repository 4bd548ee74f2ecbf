//! # recsql
//!
//! Record-to-SQL mapping with per-dialect statement templates.
//!
//! ## Features
//!
//! - **Declared fields**: a record type lists its columns once (`#[derive(Record)]`)
//! - **Flat arguments**: filters and updates are `column => value` pairs, with
//!   JSON sub-paths addressable through [`JsonPath`]
//! - **Dialect templates**: SQL text comes from a per-dialect template set; new
//!   dialects are new [`TemplateSource`] rows in a [`Registry`]
//! - **Statement cache**: prepared statements are keyed by a fingerprint of the
//!   query shape and shared by all callers, with at most one handle per shape
//! - **Soft deletes**: rows are never removed, only marked `deleted_at`
//!
//! ## Query builder
//!
//! ```ignore
//! use recsql::{args, JsonPath, QueryBuilder, TemplateName};
//!
//! let users = QueryBuilder::for_record::<User>();
//!
//! let q = users.query("postgres", TemplateName::Update, args![
//!     "age" => 18,
//!     JsonPath::object("details", ["key"]) => recsql::Json::object([("foo", "bar".into())]),
//!     "id" => "usr-132",
//! ])?;
//! let sql = users.build(&q)?;
//! ```
//!
//! ## Tables
//!
//! ```ignore
//! use recsql::{args, Table, TableConfig};
//!
//! let client = recsql::connect("postgres://localhost/app").await?;
//! let users: Table<User, _> = Table::open(client, TableConfig::new()).await?;
//!
//! let mut user = User { name: "John".into(), ..Default::default() };
//! users.insert(&mut user).await?;
//! let found = users.get(&user.base.id).await?;
//! ```

pub mod builder;
pub mod cache;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod fields;
pub mod fingerprint;
pub mod id;
pub mod json;
pub mod named;
pub mod record;
pub mod row;
pub mod table;
pub mod template;
pub mod value;

pub use builder::{Query, QueryBuilder};
pub use cache::{CacheStats, Prepare, Release, StatementCache};
pub use connection::{Connection, connect};
pub use dialect::{MYSQL, MYSQL_TEMPLATES, POSTGRES, POSTGRES_TEMPLATES, Registry, RegistryBuilder};
pub use error::{OrmError, OrmResult};
pub use fields::{FieldDescriptor, FieldKind, FieldSet};
pub use fingerprint::Fingerprint;
pub use id::id;
pub use json::{Access, ColumnRef, Json, JsonPath};
pub use record::{Base, Record};
pub use row::{FromRow, RowExt};
pub use table::{Table, TableConfig};
pub use template::{Template, TemplateName, TemplateSet, TemplateSource};
pub use value::{Arg, Value};

#[cfg(feature = "derive")]
pub use recsql_derive::Record;

// Used by derive-generated code.
#[doc(hidden)]
pub use tokio_postgres;
