//! Script discovery for a schedule slot.

use crate::error::StorageError;
use crate::event::Frequency;
use crate::storage::{Layout, ObjectStore};

/// List the scripts scheduled for `frequency`, in storage-listing order.
///
/// The folder marker (the prefix itself) and any nested folder markers are
/// dropped. At most `layout.list_limit()` keys are requested.
pub async fn list_scripts(
    store: &dyn ObjectStore,
    layout: &Layout,
    frequency: Frequency,
) -> Result<Vec<String>, StorageError> {
    let prefix = layout.scripts_prefix(frequency);

    let keys = store.list(&prefix, layout.list_limit()).await.map_err(|err| {
        tracing::error!(
            prefix = %prefix,
            kind = ?err.kind(),
            "Unable to list scripts in {}: {}",
            store.bucket(),
            err
        );
        err
    })?;

    let scripts = filter_markers(&prefix, keys);
    tracing::debug!(prefix = %prefix, count = scripts.len(), "Listed scripts");
    Ok(scripts)
}

/// Drop folder entries from a raw listing, keeping order.
pub fn filter_markers(prefix: &str, keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .filter(|key| key != prefix && !key.ends_with('/'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn marker_is_excluded() {
        let listed = keys(&[
            "scripts/daily/",
            "scripts/daily/a.sql",
            "scripts/daily/b.sql",
        ]);
        assert_eq!(
            filter_markers("scripts/daily/", listed),
            keys(&["scripts/daily/a.sql", "scripts/daily/b.sql"])
        );
    }

    #[test]
    fn marker_alone_yields_nothing() {
        assert!(filter_markers("scripts/daily/", keys(&["scripts/daily/"])).is_empty());
    }

    #[test]
    fn listing_order_is_kept() {
        let listed = keys(&[
            "scripts/weekly/z.sql",
            "scripts/weekly/",
            "scripts/weekly/a.sql",
            "scripts/weekly/archive/",
            "scripts/weekly/archive/old.sql",
        ]);
        assert_eq!(
            filter_markers("scripts/weekly/", listed),
            keys(&[
                "scripts/weekly/z.sql",
                "scripts/weekly/a.sql",
                "scripts/weekly/archive/old.sql"
            ])
        );
    }
}
