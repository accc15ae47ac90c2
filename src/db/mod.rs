//! Database gateway.
//!
//! One connection per run, shared by every script. Query output is streamed
//! straight into a sink with `COPY ... TO STDOUT` so result sets never sit in
//! memory.

use async_trait::async_trait;
use psql_runner_config::DatabaseConfig;
use tokio::io::AsyncWrite;

use crate::error::DbError;
use crate::secrets::DbPassword;

mod postgres;

pub use postgres::{PgConnector, PgSession};

/// Result type alias for DbError
pub type Result<T> = std::result::Result<T, DbError>;

/// One result row, values in the server's text representation; `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

/// Byte sink for CSV output.
pub type CsvSink<'a> = dyn AsyncWrite + Send + Unpin + 'a;

/// Everything needed to open a connection
#[derive(Clone, Debug)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: DbPassword,
}

impl ConnectParams {
    /// Fails with [`DbError::MissingConfig`] unless host, name and user are all set.
    pub fn from_config(config: &DatabaseConfig, password: DbPassword) -> Result<Self> {
        let (host, database, user) = config.identity().ok_or(DbError::MissingConfig)?;
        Ok(Self {
            host: host.to_string(),
            port: config.port,
            database: database.to_string(),
            user: user.to_string(),
            password,
        })
    }
}

/// Opens sessions
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>>;
}

/// An open connection
#[async_trait]
pub trait Session: Send {
    /// Execute `query` and materialize every row.
    async fn query_rows(&mut self, query: &str) -> Result<Vec<Row>>;

    /// Execute `statement` (already a `COPY ... TO STDOUT`) and stream its
    /// output into `sink`. Returns bytes written.
    async fn copy_out(&mut self, statement: &str, sink: &mut CsvSink<'_>) -> Result<u64>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Open a connection for the configured identity.
pub async fn connect(
    connector: &dyn Connector,
    config: &DatabaseConfig,
    password: DbPassword,
) -> Result<Box<dyn Session>> {
    let params = ConnectParams::from_config(config, password).map_err(|err| {
        tracing::error!("{}", err);
        err
    })?;

    tracing::info!(
        "Attempting to connect to DB [host={} port={} name={} user={} pass=******]",
        params.host,
        params.port,
        params.database,
        params.user
    );

    match connector.connect(&params).await {
        Ok(session) => {
            tracing::info!("Successfully obtained a database connection");
            Ok(session)
        }
        Err(err) => {
            tracing::error!("ERROR: unable to connect to the database: {}", err);
            Err(err)
        }
    }
}

/// Run a query and return all rows.
pub async fn run_query_to_rows(session: &mut dyn Session, query: &str) -> Result<Vec<Row>> {
    tracing::info!("Running query: {}", query);
    session.query_rows(query).await
}

/// Run a query and stream its result, header row first, into `sink` as CSV.
pub async fn run_query_to_csv(
    session: &mut dyn Session,
    query: &str,
    sink: &mut CsvSink<'_>,
) -> Result<u64> {
    tracing::info!("Running query: {}", query);
    session.copy_out(&copy_statement(query), sink).await
}

/// Wrap a query for CSV export. Trailing semicolons are dropped since they
/// are not allowed inside the parentheses.
pub fn copy_statement(query: &str) -> String {
    let mut query = query.trim_end();
    while let Some(rest) = query.strip_suffix(';') {
        query = rest.trim_end();
    }
    format!("COPY ({}) TO STDOUT WITH CSV HEADER", query)
}
