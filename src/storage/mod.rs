//! Object storage access.
//!
//! Scripts are read from, and results written to, a single bucket. The
//! pipeline only sees the [`ObjectStore`] trait; [`OpendalStore`] backs it
//! with OpenDAL for S3, the local filesystem, or memory in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use psql_runner_config::{StorageConfig, MAX_LIST_LIMIT};
use std::path::Path;

use crate::error::StorageError;
use crate::event::Frequency;

mod opendal_store;

pub use opendal_store::{build_operator, OpendalStore};

/// Result type alias for StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage abstraction for the script bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name, for log lines.
    fn bucket(&self) -> &str;

    /// Keys under `prefix` in listing order, at most `limit` of them.
    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;

    /// Full object body.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Upload a local file to `key`, returning the number of bytes sent.
    async fn upload_file(&self, key: &str, path: &Path) -> Result<u64>;
}

/// Key layout inside the bucket:
/// `<scripts>/<frequency>/...` in, `<results>/<frequency>/<base>/<base>-results_<ts>.csv` out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    scripts_prefix: String,
    results_prefix: String,
    list_limit: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new("scripts", "results", MAX_LIST_LIMIT)
    }
}

impl Layout {
    pub fn new(scripts_prefix: &str, results_prefix: &str, list_limit: usize) -> Self {
        Self {
            scripts_prefix: scripts_prefix.trim_matches('/').to_string(),
            results_prefix: results_prefix.trim_matches('/').to_string(),
            list_limit: list_limit.clamp(1, MAX_LIST_LIMIT),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.scripts_prefix,
            &config.results_prefix,
            config.list_limit,
        )
    }

    pub fn list_limit(&self) -> usize {
        self.list_limit
    }

    /// Listing prefix for a slot, with trailing slash: `scripts/daily/`.
    pub fn scripts_prefix(&self, frequency: Frequency) -> String {
        format!("{}/{}/", self.scripts_prefix, frequency)
    }

    /// Output key for one script's results. The timestamp has minute
    /// resolution, so two runs in the same minute share a key.
    pub fn result_key(
        &self,
        frequency: Frequency,
        script_key: &str,
        generated_at: DateTime<Utc>,
    ) -> String {
        let name = script_base_name(script_key);
        format!(
            "{}/{}/{}/{}-results_{}.csv",
            self.results_prefix,
            frequency,
            name,
            name,
            generated_at.format("%Y%m%d_%H%M")
        )
    }
}

/// File name after the last `/`, cut at its first `.`.
///
/// `scripts/daily/sales.by.region.sql` gives `sales`.
pub fn script_base_name(script_key: &str) -> &str {
    let file_name = script_key
        .rsplit_once('/')
        .map_or(script_key, |(_, name)| name);
    file_name.split('.').next().unwrap_or(file_name)
}
