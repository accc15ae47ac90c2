// Initialization utilities shared by the CLI and Lambda entry points
//
// Logging/tracing setup and construction of the long-lived clients

use crate::config::{LogFormat, RuntimeConfig};
use crate::db::PgConnector;
use crate::runner::{Runner, RunnerSettings};
use crate::secrets::SsmSecretResolver;
use crate::storage::{ObjectStore, OpendalStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the storage client for the configured bucket.
///
/// Returns `None` when no bucket is configured; the runner reports that as a
/// failed run instead of refusing to start.
pub fn init_store(config: &RuntimeConfig) -> Result<Option<Arc<dyn ObjectStore>>> {
    let Some(bucket) = config.storage.bucket() else {
        warn!("No S3_BUCKET configured; every run will fail until it is set");
        return Ok(None);
    };

    info!(
        "Initializing storage with backend: {}",
        config.storage.backend
    );

    let store = OpendalStore::from_config(&config.storage, bucket)
        .map_err(|e| anyhow::anyhow!("Failed to initialize storage: {}", e))?;

    Ok(Some(Arc::new(store)))
}

/// Build a runner with production clients: OpenDAL storage, SSM for the
/// password, PostgreSQL for queries.
pub async fn build_runner(config: &RuntimeConfig) -> Result<Runner> {
    let store = init_store(config)?;
    let secrets = SsmSecretResolver::from_env(config.secrets.password_parameter.clone()).await;

    Ok(Runner::new(
        store,
        Arc::new(secrets),
        Arc::new(PgConnector),
        RunnerSettings::from_config(config),
    ))
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = effective_log_level(config);
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already set (idempotent)
    let _ = match config.log.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

/// `DEBUG` lifts the default `info` level to `debug`; an explicit level wins.
fn effective_log_level(config: &RuntimeConfig) -> &str {
    if config.debug && config.log.level.eq_ignore_ascii_case("info") {
        "debug"
    } else {
        &config.log.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;

    #[test]
    fn debug_lifts_default_level() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Standalone);
        assert_eq!(effective_log_level(&config), "info");

        config.debug = true;
        assert_eq!(effective_log_level(&config), "debug");

        config.log.level = "warn".to_string();
        assert_eq!(effective_log_level(&config), "warn");
    }

    #[test]
    fn store_is_absent_without_bucket() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Standalone);
        config.storage.bucket = None;
        assert!(init_store(&config).unwrap().is_none());
    }

    #[test]
    fn tracing_init_is_idempotent() {
        let config = RuntimeConfig::from_platform_defaults(Platform::Standalone);
        init_tracing(&config);
        init_tracing(&config);
    }
}
