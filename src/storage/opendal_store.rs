//! OpenDAL-backed object store.

use async_trait::async_trait;
use futures::TryStreamExt;
use psql_runner_config::{StorageBackend, StorageConfig};
use std::path::Path;
use tokio::io::AsyncReadExt;

use super::{ObjectStore, Result};
use crate::error::StorageError;

/// Upload chunk size; S3 multipart parts must be at least 5 MiB.
const UPLOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;

/// Build an OpenDAL operator for `bucket` from the storage config.
pub fn build_operator(config: &StorageConfig, bucket: &str) -> Result<opendal::Operator> {
    let operator = match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| StorageError::Init {
                message: "fs config required for filesystem backend".to_string(),
            })?;

            let root = Path::new(&fs.path).join(bucket);
            let fs_builder = opendal::services::Fs::default().root(&root.to_string_lossy());
            opendal::Operator::new(fs_builder)
                .map_err(|e| StorageError::Init {
                    message: format!("Failed to create filesystem operator: {}", e),
                })?
                .finish()
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| StorageError::Init {
                message: "s3 config required for S3 backend".to_string(),
            })?;

            let mut s3_builder = opendal::services::S3::default()
                .bucket(bucket)
                .region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                s3_builder = s3_builder.endpoint(endpoint);
            }

            if s3.server_side_encryption {
                s3_builder = s3_builder.server_side_encryption_with_s3_key();
            }

            opendal::Operator::new(s3_builder)
                .map_err(|e| StorageError::Init {
                    message: format!("Failed to create S3 operator: {}", e),
                })?
                .finish()
        }
    };

    Ok(operator)
}

/// [`ObjectStore`] over an OpenDAL operator rooted at one bucket.
#[derive(Clone, Debug)]
pub struct OpendalStore {
    operator: opendal::Operator,
    bucket: String,
}

impl OpendalStore {
    pub fn new(operator: opendal::Operator, bucket: impl Into<String>) -> Self {
        Self {
            operator,
            bucket: bucket.into(),
        }
    }

    pub fn from_config(config: &StorageConfig, bucket: &str) -> Result<Self> {
        tracing::info!(
            backend = %config.backend,
            bucket,
            "Initializing object storage"
        );
        Ok(Self::new(build_operator(config, bucket)?, bucket))
    }

    pub fn operator(&self) -> &opendal::Operator {
        &self.operator
    }
}

#[async_trait]
impl ObjectStore for OpendalStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let list_err = |source| StorageError::List {
            prefix: prefix.to_string(),
            source,
        };

        // Stop paging once the cap is reached
        let mut lister = self
            .operator
            .lister_with(prefix)
            .recursive(true)
            .await
            .map_err(list_err)?;

        let mut keys = Vec::new();
        while keys.len() < limit {
            match lister.try_next().await.map_err(list_err)? {
                Some(entry) => keys.push(entry.path().to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let buffer = self
            .operator
            .read(key)
            .await
            .map_err(|source| StorageError::Read {
                key: key.to_string(),
                source,
            })?;
        Ok(buffer.to_vec())
    }

    async fn upload_file(&self, key: &str, path: &Path) -> Result<u64> {
        let local_err = |source| StorageError::LocalFile {
            path: path.to_path_buf(),
            source,
        };
        let upload_err = |source| StorageError::Upload {
            key: key.to_string(),
            source,
        };

        let mut file = tokio::fs::File::open(path).await.map_err(local_err)?;
        let mut writer = self.operator.writer(key).await.map_err(upload_err)?;

        let mut total = 0u64;
        let mut chunk = vec![0u8; UPLOAD_CHUNK_BYTES];
        loop {
            let read = match file.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    let _ = writer.abort().await;
                    return Err(local_err(err));
                }
            };
            if let Err(err) = writer.write(chunk[..read].to_vec()).await {
                let _ = writer.abort().await;
                return Err(upload_err(err));
            }
            total += read as u64;
        }

        // No partial object may be left behind under `key`
        if let Err(err) = writer.close().await {
            let _ = writer.abort().await;
            return Err(upload_err(err));
        }

        tracing::debug!(key, bytes = total, "Upload complete");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psql_runner_config::{FsConfig, MAX_LIST_LIMIT};
    use std::io::Write;

    fn memory_store() -> OpendalStore {
        let op = opendal::Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        OpendalStore::new(op, "test-bucket")
    }

    #[tokio::test]
    async fn list_is_capped_at_limit() {
        let store = memory_store();
        for idx in 0..5 {
            store
                .operator()
                .write(&format!("scripts/daily/{idx}.sql"), b"select 1".to_vec())
                .await
                .unwrap();
        }

        let keys = store.list("scripts/daily/", 3).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| k.starts_with("scripts/daily/")));
    }

    #[tokio::test]
    async fn list_below_limit_returns_everything_under_prefix() {
        let store = memory_store();
        for key in [
            "scripts/daily/a.sql",
            "scripts/daily/nested/b.sql",
            "scripts/weekly/c.sql",
        ] {
            store.operator().write(key, b"select 1".to_vec()).await.unwrap();
        }

        let mut keys = store.list("scripts/daily/", 1000).await.unwrap();
        keys.retain(|k| !k.ends_with('/'));
        keys.sort();
        assert_eq!(keys, vec!["scripts/daily/a.sql", "scripts/daily/nested/b.sql"]);

        assert!(store.list("scripts/monthly/", 1000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_missing_object_reports_not_found() {
        let store = memory_store();
        let err = store.read("scripts/daily/missing.sql").await.unwrap_err();
        assert_eq!(err.kind(), Some(opendal::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn upload_streams_local_file() {
        let store = memory_store();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "id,name\n1,alpha\n").unwrap();

        let sent = store
            .upload_file("results/daily/a/a-results_20240102_0304.csv", file.path())
            .await
            .unwrap();
        assert_eq!(sent, 16);

        let body = store
            .read("results/daily/a/a-results_20240102_0304.csv")
            .await
            .unwrap();
        assert_eq!(body, b"id,name\n1,alpha\n");
    }

    #[tokio::test]
    async fn upload_of_missing_local_file_fails_before_writing() {
        let store = memory_store();
        let err = store
            .upload_file("results/x.csv", Path::new("/no/such/file.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::LocalFile { .. }));
        assert!(store.read("results/x.csv").await.is_err());
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_object() {
        let dir = tempfile::tempdir().unwrap();
        let op = opendal::Operator::new(
            opendal::services::Fs::default().root(&dir.path().to_string_lossy()),
        )
        .unwrap()
        .finish();
        let store = OpendalStore::new(op, "reports");
        // A plain file where the result folder should be
        std::fs::create_dir(dir.path().join("results")).unwrap();
        std::fs::write(dir.path().join("results/daily"), b"").unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "id\n1\n").unwrap();

        let err = store
            .upload_file("results/daily/a/a-results_20240102_0304.csv", file.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Upload { .. }));
        assert!(store
            .read("results/daily/a/a-results_20240102_0304.csv")
            .await
            .is_err());
    }

    #[test]
    fn fs_backend_roots_bucket_under_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("reports")).unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Fs,
            bucket: Some("reports".to_string()),
            scripts_prefix: "scripts".to_string(),
            results_prefix: "results".to_string(),
            list_limit: MAX_LIST_LIMIT,
            s3: None,
            fs: Some(FsConfig {
                path: dir.path().to_string_lossy().into_owned(),
            }),
        };

        let op = build_operator(&config, "reports").unwrap();
        assert_eq!(op.info().scheme(), opendal::Scheme::Fs);
    }

    #[test]
    fn fs_backend_without_section_is_rejected() {
        let config = StorageConfig {
            backend: StorageBackend::Fs,
            bucket: Some("reports".to_string()),
            scripts_prefix: "scripts".to_string(),
            results_prefix: "results".to_string(),
            list_limit: MAX_LIST_LIMIT,
            s3: None,
            fs: None,
        };
        assert!(matches!(
            build_operator(&config, "reports"),
            Err(StorageError::Init { .. })
        ));
    }
}
