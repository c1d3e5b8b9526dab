use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use super::error::{CacheError, CacheResult};
use super::store::SharedStore;

/// Maximum number of live handles the pool keeps before it is cleared.
pub(super) const MAX_CACHE_SIZE: usize = 1024;

/// A handle to one remote cache, bound to a name and an optional entry TTL.
///
/// Handles are immutable once created and cheap to clone. Writes through a
/// handle prefix the entry key with `"{name}::"` and apply the handle's TTL.
#[derive(Clone)]
pub struct CacheHandle {
    name: Arc<str>,
    ttl: Option<Duration>,
    store: Arc<dyn SharedStore>,
}

impl CacheHandle {
    fn new(name: String, ttl: Option<Duration>, store: Arc<dyn SharedStore>) -> Self {
        Self {
            name: name.into(),
            ttl,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// The full store key for an entry of this cache.
    pub fn entry_key(&self, key: &str) -> String {
        format!("{}::{key}", self.name)
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.store.get(&self.entry_key(key)).await
    }

    pub async fn put(&self, key: &str, value: Value) -> CacheResult<()> {
        self.store.set(&self.entry_key(key), value, self.ttl).await
    }

    pub async fn evict(&self, key: &str) -> CacheResult<()> {
        self.store.delete(&self.entry_key(key)).await
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Produces cache handles against the shared store.
///
/// Timed handles (positive TTL) go through the [`CachePool`]; the untimed
/// variant is the fallback when the pool cannot produce one.
pub struct CacheManager {
    store: Arc<dyn SharedStore>,
    project: Option<String>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn SharedStore>, project: Option<String>) -> Self {
        Self { store, project }
    }

    /// The cache name as used in the store, with the project prefix applied.
    pub fn qualified_name(&self, name: &str) -> String {
        match self.project.as_deref() {
            Some(project) if !project.is_empty() => format!("{project}::{name}"),
            _ => name.to_owned(),
        }
    }

    /// Creates a handle without an entry TTL, or `None` for an empty name.
    pub fn untimed(&self, name: &str) -> Option<CacheHandle> {
        if name.is_empty() {
            return None;
        }
        Some(CacheHandle::new(
            self.qualified_name(name),
            None,
            Arc::clone(&self.store),
        ))
    }

    fn timed(&self, name: &str, ttl_secs: i64) -> Option<CacheHandle> {
        if name.is_empty() || ttl_secs <= 0 {
            return None;
        }
        Some(CacheHandle::new(
            self.qualified_name(name),
            Some(Duration::from_secs(ttl_secs as u64)),
            Arc::clone(&self.store),
        ))
    }
}

/// Bounded registry of `(name, ttl)` to live cache handles.
pub struct CachePool {
    manager: CacheManager,
    handles: Mutex<HashMap<(String, i64), CacheHandle>>,
}

impl CachePool {
    pub fn new(manager: CacheManager) -> Self {
        Self {
            manager,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up or creates the handle for `(name, ttl)`.
    ///
    /// Returns `None` when the manager cannot produce a handle (empty name or
    /// non-positive TTL); callers must treat that as "fall back to an untimed
    /// lookup". Creation runs outside the pool lock and is inserted with
    /// put-if-absent semantics, so a losing concurrent creator discards its
    /// own handle.
    pub fn get(&self, name: &str, ttl: i64) -> Option<CacheHandle> {
        self.clear_if_over_size();

        let pool_key = (name.to_owned(), ttl);
        if let Some(handle) = self.handles.lock().unwrap().get(&pool_key) {
            return Some(handle.clone());
        }

        let created = self.manager.timed(name, ttl)?;
        let mut handles = self.handles.lock().unwrap();
        Some(handles.entry(pool_key).or_insert(created).clone())
    }

    /// Resolves a cache for `name`, falling back to an untimed handle when
    /// the pool yields none.
    ///
    /// A name for which no cache at all can be produced is a configuration
    /// error and fails loudly.
    pub fn resolve(&self, name: &str, ttl: i64) -> CacheResult<CacheHandle> {
        if let Some(handle) = self.get(name, ttl) {
            return Ok(handle);
        }
        self.manager
            .untimed(name)
            .ok_or_else(|| CacheError::NoSuchCache(name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().unwrap().is_empty()
    }

    /// Clears the whole pool once it exceeds [`MAX_CACHE_SIZE`].
    ///
    /// No individual eviction: the one-time burst of re-creation cost is the
    /// accepted trade for a bounded registry.
    fn clear_if_over_size(&self) {
        let mut handles = self.handles.lock().unwrap();
        if handles.len() > MAX_CACHE_SIZE {
            tracing::debug!(size = handles.len(), "Clearing oversized cache pool");
            handles.clear();
            metric!(counter("pool.cleared") += 1);
        }
    }
}
