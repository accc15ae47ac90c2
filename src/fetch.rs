//! Script body retrieval.

use crate::error::StorageError;
use crate::storage::ObjectStore;

/// Read one script as UTF-8 text.
pub async fn read_script(store: &dyn ObjectStore, key: &str) -> Result<String, StorageError> {
    tracing::info!("Attempting to read {} from bucket {}", key, store.bucket());

    let body = store.read(key).await.map_err(|err| {
        tracing::error!(key, kind = ?err.kind(), "Unable to read file from storage: {}", err);
        err
    })?;

    String::from_utf8(body).map_err(|source| {
        let err = StorageError::Decode {
            key: key.to_string(),
            source,
        };
        tracing::error!(key, "{}", err);
        err
    })
}
