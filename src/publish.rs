//! Result upload.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::StorageError;
use crate::event::Frequency;
use crate::storage::{Layout, ObjectStore};

/// Where one script's results landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedResult {
    pub key: String,
    pub bytes: u64,
}

/// Upload a local CSV to the script's result key.
///
/// Server-side encryption is a property of the store (see
/// `S3Config::server_side_encryption`), so every upload through an S3-backed
/// store requests it.
pub async fn publish(
    store: &dyn ObjectStore,
    layout: &Layout,
    frequency: Frequency,
    generated_at: DateTime<Utc>,
    script_key: &str,
    local_file: &Path,
) -> Result<PublishedResult, StorageError> {
    let key = layout.result_key(frequency, script_key, generated_at);

    tracing::info!("Writing results to {} in bucket {}", key, store.bucket());

    match store.upload_file(&key, local_file).await {
        Ok(bytes) => Ok(PublishedResult { key, bytes }),
        Err(err) => {
            tracing::error!(key = %key, kind = ?err.kind(), "Unable to write results: {}", err);
            Err(err)
        }
    }
}
