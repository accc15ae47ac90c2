// Configuration validation
//
// Rejects values that can never work. Absent bucket or database identity are
// left to the runner, which reports them as precondition failures.

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_database_config(&config.database)?;
    validate_storage_config(&config.storage)?;
    validate_log_config(&config.log)?;
    Ok(())
}

fn validate_database_config(config: &DatabaseConfig) -> Result<()> {
    if config.port == 0 {
        bail!("database.port must be greater than 0");
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.scripts_prefix.trim_matches('/').is_empty() {
        bail!("storage.scripts_prefix must not be empty");
    }

    if config.results_prefix.trim_matches('/').is_empty() {
        bail!("storage.results_prefix must not be empty");
    }

    if config.list_limit == 0 || config.list_limit > MAX_LIST_LIMIT {
        bail!(
            "storage.list_limit must be between 1 and {}",
            MAX_LIST_LIMIT
        );
    }

    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!(
                    "Filesystem path is required\n\n\
                    How to fix:\n\
                      • Environment: export {}STORAGE_PATH=/data/psql-runner\n\
                      • TOML: [storage.fs]\n              path = \"/data/psql-runner\"",
                    ENV_PREFIX
                );
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.region.is_empty() {
                bail!(
                    "S3 region is required\n\n\
                    How to fix:\n\
                      • Environment: export S3_REGION=us-west-2\n\
                      • TOML: [storage.s3]\n              region = \"us-west-2\""
                );
            }

            if !s3.server_side_encryption {
                warn!("storage.s3.server_side_encryption is disabled; results are uploaded unencrypted");
            }
        }
    }

    Ok(())
}

fn validate_log_config(config: &LogConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("log.level must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(backend: StorageBackend) -> StorageConfig {
        StorageConfig {
            backend,
            bucket: Some("reports".to_string()),
            scripts_prefix: "scripts".to_string(),
            results_prefix: "results".to_string(),
            list_limit: MAX_LIST_LIMIT,
            s3: Some(S3Config::default()),
            fs: None,
        }
    }

    #[test]
    fn test_validate_storage_config() {
        assert!(validate_storage_config(&storage(StorageBackend::S3)).is_ok());

        let mut no_region = storage(StorageBackend::S3);
        no_region.s3.as_mut().unwrap().region = String::new();
        assert!(validate_storage_config(&no_region).is_err());

        let fs_without_section = storage(StorageBackend::Fs);
        assert!(validate_storage_config(&fs_without_section).is_err());

        let mut too_many = storage(StorageBackend::S3);
        too_many.list_limit = MAX_LIST_LIMIT + 1;
        assert!(validate_storage_config(&too_many).is_err());

        let mut bare_prefix = storage(StorageBackend::S3);
        bare_prefix.scripts_prefix = "/".to_string();
        assert!(validate_storage_config(&bare_prefix).is_err());
    }

    #[test]
    fn missing_bucket_is_not_a_load_error() {
        let mut config = storage(StorageBackend::S3);
        config.bucket = None;
        assert!(validate_storage_config(&config).is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let db = DatabaseConfig {
            port: 0,
            ..DatabaseConfig::default()
        };
        assert!(validate_database_config(&db).is_err());
    }
}
