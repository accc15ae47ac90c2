// Lambda payload handling against in-memory storage

use async_trait::async_trait;
use psql_runner::config::DatabaseConfig;
use psql_runner::db::{ConnectParams, Connector, Session};
use psql_runner::error::{DbError, SecretError};
use psql_runner::secrets::{DbPassword, SecretResolver};
use psql_runner::storage::{ObjectStore, OpendalStore};
use psql_runner::{Runner, RunnerSettings};
use psql_runner_lambda::handle_payload;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct StaticPassword;

#[async_trait]
impl SecretResolver for StaticPassword {
    async fn db_password(&self) -> Result<DbPassword, SecretError> {
        Ok(DbPassword::new("secret"))
    }
}

/// Counts attempts and refuses every connection.
#[derive(Default)]
struct RefusingConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn Session>, DbError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DbError::MissingConfig)
    }
}

async fn runner_with(scripts: &[&str], connector: Arc<RefusingConnector>) -> Runner {
    let op = opendal::Operator::new(opendal::services::Memory::default())
        .unwrap()
        .finish();
    for key in scripts {
        op.write(key, b"select 1".to_vec()).await.unwrap();
    }
    let store: Arc<dyn ObjectStore> = Arc::new(OpendalStore::new(op, "reports"));
    Runner::new(
        Some(store),
        Arc::new(StaticPassword),
        connector,
        RunnerSettings {
            database: DatabaseConfig {
                host: Some("db.internal".to_string()),
                port: 5432,
                name: Some("reporting".to_string()),
                user: Some("runner".to_string()),
            },
            ..RunnerSettings::default()
        },
    )
}

#[tokio::test]
async fn empty_slot_returns_zero_without_connecting() {
    let connector = Arc::new(RefusingConnector::default());
    let runner = runner_with(&["scripts/weekly/a.sql"], connector.clone()).await;

    assert_eq!(handle_payload(json!({"frequency": "daily"}), &runner).await, 0);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_or_missing_frequency_returns_one() {
    let connector = Arc::new(RefusingConnector::default());
    let runner = runner_with(&["scripts/daily/a.sql"], connector.clone()).await;

    assert_eq!(handle_payload(json!({"frequency": "hourly"}), &runner).await, 1);
    assert_eq!(handle_payload(json!({"source": "aws.events"}), &runner).await, 1);
    assert_eq!(handle_payload(json!("daily"), &runner).await, 1);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_connection_returns_one() {
    let connector = Arc::new(RefusingConnector::default());
    let runner = runner_with(&["scripts/daily/a.sql"], connector.clone()).await;

    assert_eq!(handle_payload(json!({"frequency": "daily"}), &runner).await, 1);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
}
