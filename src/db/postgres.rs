//! PostgreSQL sessions over a single sqlx connection.

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Row as _, ValueRef as _};
use tokio::io::AsyncWriteExt;

use super::{ConnectParams, Connector, CsvSink, Result, Row, Session};
use crate::error::DbError;

/// Opens plain (unpooled) PostgreSQL connections.
#[derive(Clone, Debug, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>> {
        let options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.database)
            .username(&params.user)
            .password(params.password.expose());

        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|source| DbError::Connect { source })?;

        Ok(Box::new(PgSession { conn }))
    }
}

/// An open PostgreSQL connection.
pub struct PgSession {
    conn: PgConnection,
}

/// Map one text-format value; `None` is SQL NULL.
fn text_value(
    column: usize,
    value: Option<std::result::Result<&str, BoxDynError>>,
) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(Ok(text)) => Ok(Some(text.to_string())),
        Some(Err(e)) => Err(DbError::Decode {
            column,
            message: e.to_string(),
        }),
    }
}

#[async_trait]
impl Session for PgSession {
    async fn query_rows(&mut self, query: &str) -> Result<Vec<Row>> {
        // Simple-query protocol: every value arrives in text format
        let rows = sqlx::Executor::fetch_all(&mut self.conn, sqlx::raw_sql(query))
            .await
            .map_err(|source| DbError::Query { source })?;

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|column| {
                        let value = row
                            .try_get_raw(column)
                            .map_err(|source| DbError::Query { source })?;
                        let text = (!value.is_null()).then(|| value.as_str());
                        text_value(column, text)
                    })
                    .collect::<Result<Row>>()
            })
            .collect()
    }

    async fn copy_out(&mut self, statement: &str, sink: &mut CsvSink<'_>) -> Result<u64> {
        let mut stream = self
            .conn
            .copy_out_raw(statement)
            .await
            .map_err(|source| DbError::Query { source })?;

        let mut written = 0u64;
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|source| DbError::Query { source })?
        {
            sink.write_all(&chunk)
                .await
                .map_err(|source| DbError::Sink { source })?;
            written += chunk.len() as u64;
        }

        sink.flush()
            .await
            .map_err(|source| DbError::Sink { source })?;

        Ok(written)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|source| DbError::Close { source })
    }
}
