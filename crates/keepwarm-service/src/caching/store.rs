use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::error::CacheResult;

/// The shared remote key-value store the engine operates against.
///
/// This is the seam to the actual store client, which is provided by the
/// embedder. Two shapes are needed: a flat keyed store with optional
/// expiration for cache values, and a hash-shaped keyed store for the
/// refresh-descriptor and last-access namespaces.
///
/// All calls are network round-trips from the engine's perspective; failures
/// propagate to the calling operation since the store is a required
/// dependency, not an optional one.
pub trait SharedStore: Send + Sync + 'static {
    /// Writes `value` under `key`, expiring after `ttl` when given.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: Value,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, CacheResult<()>>;

    /// Reads the value stored under `key`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<Option<Value>>>;

    /// Removes the value stored under `key`.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<()>>;

    /// Writes `value` under `field` of the hash `map`.
    fn hash_put<'a>(
        &'a self,
        map: &'a str,
        field: &'a str,
        value: Value,
    ) -> BoxFuture<'a, CacheResult<()>>;

    /// Reads `field` of the hash `map`.
    fn hash_get<'a>(
        &'a self,
        map: &'a str,
        field: &'a str,
    ) -> BoxFuture<'a, CacheResult<Option<Value>>>;

    /// Reads all `(field, value)` pairs of the hash `map`.
    fn hash_entries<'a>(&'a self, map: &'a str) -> BoxFuture<'a, CacheResult<Vec<(String, Value)>>>;

    /// Removes `field` from the hash `map`.
    fn hash_delete<'a>(&'a self, map: &'a str, field: &'a str) -> BoxFuture<'a, CacheResult<()>>;
}

/// A write operation observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set {
        key: String,
        value: Value,
        ttl: Option<Duration>,
    },
    Delete {
        key: String,
    },
    HashPut {
        map: String,
        field: String,
    },
    HashDelete {
        map: String,
        field: String,
    },
}

/// An in-process [`SharedStore`] backend.
///
/// This exists for tests and local runs. TTLs are recorded alongside every
/// write but not enforced; the recorded operation log lets tests assert the
/// exact write semantics (including the TTL argument) without a real store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    flat: Mutex<HashMap<String, Value>>,
    hashes: Mutex<HashMap<String, HashMap<String, Value>>>,
    ops: Mutex<Vec<StoreOp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All write operations performed so far, in order.
    pub fn recorded_ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Synchronous peek at a flat key, for assertions.
    pub fn flat_value(&self, key: &str) -> Option<Value> {
        self.flat.lock().unwrap().get(key).cloned()
    }

    /// Synchronous peek at a hash field, for assertions.
    pub fn hash_value(&self, map: &str, field: &str) -> Option<Value> {
        self.hashes
            .lock()
            .unwrap()
            .get(map)
            .and_then(|fields| fields.get(field))
            .cloned()
    }

    /// Number of fields in a hash, for assertions.
    pub fn hash_len(&self, map: &str) -> usize {
        self.hashes
            .lock()
            .unwrap()
            .get(map)
            .map_or(0, |fields| fields.len())
    }

    fn record(&self, op: StoreOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl SharedStore for MemoryStore {
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: Value,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, CacheResult<()>> {
        self.flat
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.clone());
        self.record(StoreOp::Set {
            key: key.to_owned(),
            value,
            ttl,
        });
        futures::future::ok(()).boxed()
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<Option<Value>>> {
        let value = self.flat.lock().unwrap().get(key).cloned();
        futures::future::ok(value).boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<()>> {
        self.flat.lock().unwrap().remove(key);
        self.record(StoreOp::Delete {
            key: key.to_owned(),
        });
        futures::future::ok(()).boxed()
    }

    fn hash_put<'a>(
        &'a self,
        map: &'a str,
        field: &'a str,
        value: Value,
    ) -> BoxFuture<'a, CacheResult<()>> {
        self.hashes
            .lock()
            .unwrap()
            .entry(map.to_owned())
            .or_default()
            .insert(field.to_owned(), value);
        self.record(StoreOp::HashPut {
            map: map.to_owned(),
            field: field.to_owned(),
        });
        futures::future::ok(()).boxed()
    }

    fn hash_get<'a>(
        &'a self,
        map: &'a str,
        field: &'a str,
    ) -> BoxFuture<'a, CacheResult<Option<Value>>> {
        let value = self.hash_value(map, field);
        futures::future::ok(value).boxed()
    }

    fn hash_entries<'a>(
        &'a self,
        map: &'a str,
    ) -> BoxFuture<'a, CacheResult<Vec<(String, Value)>>> {
        let entries = self
            .hashes
            .lock()
            .unwrap()
            .get(map)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        futures::future::ok(entries).boxed()
    }

    fn hash_delete<'a>(&'a self, map: &'a str, field: &'a str) -> BoxFuture<'a, CacheResult<()>> {
        if let Some(fields) = self.hashes.lock().unwrap().get_mut(map) {
            fields.remove(field);
        }
        self.record(StoreOp::HashDelete {
            map: map.to_owned(),
            field: field.to_owned(),
        });
        futures::future::ok(()).boxed()
    }
}
