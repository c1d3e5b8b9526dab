use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::Config;

use super::access::{AccessRecorder, refresh_namespace};
use super::descriptor::RefreshDescriptor;
use super::error::CacheResult;
use super::registry::{CallContext, OperationRegistry};
use super::store::SharedStore;

/// Unit of work dispatched to the replay worker pool.
struct ReplayMessage {
    descriptor: RefreshDescriptor,
}

/// The pieces a replay unit needs, shared with the worker task.
struct ReplayShared {
    store: Arc<dyn SharedStore>,
    registry: Arc<OperationRegistry>,
    namespace: String,
}

impl ReplayShared {
    /// Replays one descriptor and writes the fresh value back under its key.
    ///
    /// Failed replays are not retried: the descriptor is deleted and the next
    /// natural cache miss will re-register it. Nothing is ever raised to a
    /// caller from here.
    async fn execute(&self, descriptor: RefreshDescriptor) {
        let key = descriptor.key.clone();
        match self.try_execute(descriptor).await {
            Ok(()) => {
                metric!(counter("refresher.replay") += 1, "status" => "ok");
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    key = %key,
                    "Cache replay failed, dropping descriptor",
                );
                metric!(counter("refresher.replay") += 1, "status" => "error");
                if let Err(err) = self.store.hash_delete(&self.namespace, &key).await {
                    tracing::error!(error = %err, "Failed to delete broken refresh descriptor");
                }
            }
        }
    }

    async fn try_execute(&self, descriptor: RefreshDescriptor) -> CacheResult<()> {
        let ctx = CallContext::replay();

        // Evict first, otherwise a not-yet-expired entry would let the replay
        // observe the cached value instead of recomputing it.
        self.store.delete(&descriptor.key).await?;

        let handler = self
            .registry
            .resolve(&descriptor.target, &descriptor.operation)?;
        let value = handler(ctx, descriptor.args).await?;

        let ttl = (descriptor.ttl > 0).then(|| Duration::from_secs(descriptor.ttl as u64));
        self.store.set(&descriptor.key, value, ttl).await
    }
}

/// Keeps registered cache keys warm.
///
/// Owns the distributed descriptor store: [`add_cache`](Self::add_cache)
/// registers descriptors with de-duplication, [`refresh`](Self::refresh)
/// replays them on a bounded worker pool, and
/// [`clean_refresh_value`](Self::clean_refresh_value) sweeps bookkeeping for
/// keys past the inactivity window.
pub struct Refresher {
    shared: Arc<ReplayShared>,
    access: Arc<AccessRecorder>,
    max_unused_for: Option<Duration>,
    replay_tx: mpsc::Sender<ReplayMessage>,
}

impl Refresher {
    pub fn new(
        store: Arc<dyn SharedStore>,
        registry: Arc<OperationRegistry>,
        access: Arc<AccessRecorder>,
        config: &Config,
        runtime: &tokio::runtime::Handle,
    ) -> Self {
        let shared = Arc::new(ReplayShared {
            store,
            registry,
            namespace: refresh_namespace(config.project.as_deref()),
        });

        let (replay_tx, replay_rx) = mpsc::channel(config.worker.effective_queue_size());
        runtime.spawn(Self::replay_worker(
            replay_rx,
            Arc::clone(&shared),
            config.worker.effective_pool_size(),
        ));

        Self {
            shared,
            access,
            max_unused_for: config.max_unused_for,
            replay_tx,
        }
    }

    /// The hash namespace descriptors are stored under.
    pub fn namespace(&self) -> &str {
        &self.shared.namespace
    }

    /// Registers a descriptor for auto-refresh, de-duplicated by TTL.
    ///
    /// Unless the call is itself a replay, the key's last-access time is
    /// stamped first. A stored descriptor with the same TTL makes this a
    /// no-op without any remote write; a differing TTL always overwrites, so
    /// the latest registration wins.
    pub async fn add_cache(&self, descriptor: RefreshDescriptor, ctx: CallContext) -> CacheResult<()> {
        if descriptor.ttl <= 0 {
            // Entries without a positive TTL never expire, so there is
            // nothing to keep warm.
            return Ok(());
        }

        if !ctx.replaying {
            self.access.register(&descriptor.key).await?;
        }

        let existing = self
            .shared
            .store
            .hash_get(&self.shared.namespace, &descriptor.key)
            .await?;
        if let Some(raw) = existing
            && let Ok(stored) = serde_json::from_value::<RefreshDescriptor>(raw)
            && stored.is_equivalent(&descriptor)
        {
            metric!(counter("refresher.descriptor") += 1, "status" => "deduplicated");
            return Ok(());
        }

        let key = descriptor.key.clone();
        let value = serde_json::to_value(&descriptor)?;
        self.shared
            .store
            .hash_put(&self.shared.namespace, &key, value)
            .await?;
        metric!(counter("refresher.descriptor") += 1, "status" => "stored");
        Ok(())
    }

    /// Dispatches a replay for every stored descriptor.
    ///
    /// Malformed descriptors are deleted on the spot (self-healing against
    /// corrupt writes). Dispatch never waits for replay units: when the
    /// worker queue is saturated the unit is skipped and the descriptor
    /// stays for the next tick.
    pub async fn refresh(&self) -> CacheResult<()> {
        let entries = self
            .shared
            .store
            .hash_entries(&self.shared.namespace)
            .await?;
        if entries.is_empty() {
            return Ok(());
        }

        for (key, raw) in entries {
            let descriptor = match serde_json::from_value::<RefreshDescriptor>(raw) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Removing malformed refresh descriptor");
                    self.shared.store.hash_delete(&self.shared.namespace, &key).await?;
                    continue;
                }
            };

            match self.replay_tx.try_send(ReplayMessage { descriptor }) {
                Ok(()) => {
                    metric!(counter("refresher.dispatch") += 1, "status" => "queued");
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(key = %key, "Replay queue saturated, skipping until next tick");
                    metric!(counter("refresher.dispatch") += 1, "status" => "dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::error!("Replay worker is gone, aborting dispatch");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Removes refresh bookkeeping for keys past the inactivity window.
    ///
    /// Disabled when no window is configured. A missing or malformed
    /// timestamp removes both the descriptor and the access record for that
    /// key, as does a timestamp older than the window.
    pub async fn clean_refresh_value(&self) -> CacheResult<()> {
        let Some(window) = self.max_unused_for.filter(|window| !window.is_zero()) else {
            return Ok(());
        };

        let records = self.access.get_all().await?;
        if records.is_empty() {
            return Ok(());
        }

        let now = Utc::now().timestamp_millis();
        let window = window.as_millis() as i64;
        for (key, timestamp) in records {
            let stale = match timestamp.as_i64() {
                Some(accessed_at) => now - accessed_at > window,
                None => true,
            };
            if stale {
                self.shared
                    .store
                    .hash_delete(&self.shared.namespace, &key)
                    .await?;
                self.access.delete(&key).await?;
                metric!(counter("sweeper.removed") += 1);
            }
        }
        Ok(())
    }

    /// Runs one replay unit synchronously, bypassing the worker pool.
    #[cfg(test)]
    pub(super) async fn execute(&self, descriptor: RefreshDescriptor) {
        self.shared.execute(descriptor).await;
    }

    /// Long running task executing replay units with bounded concurrency.
    async fn replay_worker(
        mut work_rx: mpsc::Receiver<ReplayMessage>,
        shared: Arc<ReplayShared>,
        max_concurrent: usize,
    ) {
        let (done_tx, mut done_rx) = mpsc::channel::<()>(max_concurrent);
        let mut slots = max_concurrent;
        loop {
            tokio::select! {
                Some(message) = work_rx.recv(), if slots > 0 => {
                    slots -= 1;
                    let shared = Arc::clone(&shared);
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        shared.execute(message.descriptor).await;
                        done_tx.send(()).await.ok();
                    });
                    let in_flight = (max_concurrent - slots) as u64;
                    metric!(gauge("refresher.replays_in_flight") = in_flight);
                }
                Some(_) = done_rx.recv() => {
                    slots += 1;
                }
                else => break,
            }
        }
        tracing::info!("Replay worker terminated");
    }
}

impl std::fmt::Debug for Refresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refresher")
            .field("namespace", &self.shared.namespace)
            .field("max_unused_for", &self.max_unused_for)
            .finish()
    }
}
