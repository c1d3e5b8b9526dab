//! # TTL-aware cache resolution and auto-refresh
//!
//! This module augments a key-value cache backed by a shared remote store with
//! per-entry TTL semantics and an automatic background refresh mechanism, so
//! callers never observe a cache-miss penalty for hot keys.
//!
//! ## Components
//!
//! The engine is made up of the following pieces:
//!
//! - The [`CachePool`] hands out [`CacheHandle`]s bound to a `(name, ttl)`
//!   pair. The pool is bounded: once it holds more than 1024 handles it is
//!   cleared wholesale before the next lookup, trading a one-time burst of
//!   re-creation cost for simplicity. Handles are never evicted individually.
//! - The [`RefreshRegistrar`] decides, per intercepted call, whether the key
//!   must be kept warm. It consults the (external) condition/key
//!   [`Evaluator`], resolves the effective store key and hands a
//!   [`RefreshDescriptor`] to the [`Refresher`].
//! - The [`AccessRecorder`] stamps a last-access timestamp per cache key in
//!   the shared store; the sweep uses those stamps to prune bookkeeping for
//!   keys nobody reads anymore.
//! - The [`Refresher`] owns the distributed descriptor store. Registration is
//!   de-duplicated: a descriptor whose TTL equals the stored one is a no-op,
//!   which avoids rewriting the remote map on every invocation of a hot,
//!   unchanged operation. On a tick it replays every stored descriptor
//!   through the [`OperationRegistry`] on a bounded worker pool and writes
//!   the fresh value back with the descriptor's TTL. Broken descriptors are
//!   deleted rather than retried; the next natural cache miss re-registers
//!   them.
//! - The scheduler ([`spawn_scheduler`]) fires the stale-entry sweep and then
//!   the refresh dispatch on a configured interval. Without a schedule the
//!   engine is inert except for on-demand registration.
//!
//! ## Shared state and races
//!
//! All shared mutable state other than the handle pool lives in the external
//! [`SharedStore`] and is accessed without application-level locking.
//! Correctness under races comes from idempotent last-write-wins semantics,
//! not locks: a registration racing a sweep may cost one extra remote write,
//! which is acceptable. De-duplication is best-effort, not a distributed
//! lock.
//!
//! ## Replay and reentrancy
//!
//! A replay re-invokes the original operation through the
//! [`OperationRegistry`], a registry of `(target, operation)` handlers
//! populated at startup. The replay runs with a [`CallContext`] whose
//! `replaying` flag is set; a nested qualifying call threading that context
//! through registration skips the access-recorder stamp but still goes
//! through de-duplicated storage.
//!
//! Replay failures are never surfaced to callers: the broken descriptor is
//! deleted and the failure is logged. Evaluation and cache-resolution
//! failures on the registration path, in contrast, indicate configuration
//! defects and propagate to the caller.

mod access;
mod descriptor;
mod error;
mod key;
mod pool;
mod refresher;
mod registrar;
mod registry;
mod scheduler;
mod store;

pub use access::AccessRecorder;
pub use descriptor::RefreshDescriptor;
pub use error::{CacheError, CacheResult};
pub use key::{KeyGenerator, STRUCTURAL_KEY_GENERATOR, StructuralKeyGenerator};
pub use pool::{CacheHandle, CacheManager, CachePool};
pub use refresher::Refresher;
pub use registrar::{CacheableConfig, Evaluator, InvocationContext, RefreshRegistrar};
pub use registry::{CallContext, OperationHandler, OperationRegistry};
pub use scheduler::spawn_scheduler;
pub use store::{MemoryStore, SharedStore, StoreOp};
