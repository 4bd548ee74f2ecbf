//! Connection seam and the tokio-postgres implementation.

use crate::cache::{Prepare, Release};
use crate::dialect::POSTGRES;
use crate::error::{OrmError, OrmResult};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, Statement};

/// A connection that executes prepared statements.
pub trait Connection: Prepare {
    /// Run a prepared statement and return all rows.
    fn query_prepared(
        &self,
        stmt: &Self::Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Run a prepared statement and return the affected row count.
    fn execute_prepared(
        &self,
        stmt: &Self::Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Token used to cancel an in-flight query after a timeout.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }
}

// The server deallocates a statement when its last client-side clone drops.
impl Release for Statement {
    fn release(&self) -> OrmResult<()> {
        Ok(())
    }
}

impl Prepare for Client {
    type Statement = Statement;

    fn dialect(&self) -> &str {
        POSTGRES
    }

    async fn prepare_statement(&self, sql: &str) -> OrmResult<Statement> {
        Client::prepare(self, sql)
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl Connection for Client {
    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Vec<Row>> {
        Client::query(self, stmt, params)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<u64> {
        Client::execute(self, stmt, params)
            .await
            .map_err(OrmError::from_db_error)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(Client::cancel_token(self))
    }
}

/// Connect with `NoTls` using a PostgreSQL connection URL.
///
/// The connection task is spawned on the current tokio runtime; it logs and
/// exits when the connection fails.
pub async fn connect(database_url: &str) -> OrmResult<Client> {
    let config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| OrmError::Connection(e.to_string()))?;

    let (client, connection) = config
        .connect(tokio_postgres::NoTls)
        .await
        .map_err(|e| OrmError::Connection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(target: "recsql.sql", error = %e, "postgres connection error");
        }
    });

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let err = connect("postgres://user@host:notaport/db").await.unwrap_err();
        assert!(matches!(err, OrmError::Connection(_)), "{err}");
    }
}
