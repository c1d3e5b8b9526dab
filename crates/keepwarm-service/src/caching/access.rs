use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::error::CacheResult;
use super::store::SharedStore;

/// Derives the hash namespace for the refresh-descriptor map.
///
/// The project prefix is omitted entirely when unset.
pub(super) fn refresh_namespace(project: Option<&str>) -> String {
    namespaced(project, "refresh")
}

/// Derives the hash namespace for the last-access map.
pub(super) fn access_namespace(project: Option<&str>) -> String {
    namespaced(project, "last-access")
}

fn namespaced(project: Option<&str>, base: &str) -> String {
    match project {
        Some(project) if !project.is_empty() => format!("{project}::{base}"),
        _ => base.to_owned(),
    }
}

/// Records the last access time per cache key in the shared store.
///
/// A thin wrapper around one hash namespace, but its key derivation and
/// hash-field semantics are what the sweep's correctness depends on: the
/// sweep reads these stamps to decide which refresh descriptors still earn
/// their keep.
pub struct AccessRecorder {
    store: Arc<dyn SharedStore>,
    namespace: String,
}

impl AccessRecorder {
    pub fn new(store: Arc<dyn SharedStore>, project: Option<&str>) -> Self {
        Self {
            store,
            namespace: access_namespace(project),
        }
    }

    /// Stamps "last accessed now" (epoch millis) for `key`.
    pub async fn register(&self, key: &str) -> CacheResult<()> {
        let now = Utc::now().timestamp_millis();
        self.store
            .hash_put(&self.namespace, key, Value::from(now))
            .await?;
        metric!(counter("access.recorded") += 1);
        Ok(())
    }

    /// Reads all `(key, timestamp)` records.
    pub async fn get_all(&self) -> CacheResult<Vec<(String, Value)>> {
        self.store.hash_entries(&self.namespace).await
    }

    /// Removes the record for one key.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.hash_delete(&self.namespace, key).await
    }
}
