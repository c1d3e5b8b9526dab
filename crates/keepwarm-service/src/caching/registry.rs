use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use super::error::{CacheError, CacheResult};

/// Context threaded through every cacheable call.
///
/// The `replaying` flag replaces an ambient thread-local: it is set for the
/// duration of a single replay unit and consulted by the registrar to avoid
/// re-stamping access times while replaying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    /// True while this call is a refresh replay.
    pub replaying: bool,
}

impl CallContext {
    /// The context replay units run under.
    pub fn replay() -> Self {
        Self { replaying: true }
    }
}

/// A replayable operation: invoked with the call context and the recorded
/// argument values, yields the fresh value to cache.
pub type OperationHandler =
    Arc<dyn Fn(CallContext, Vec<Value>) -> BoxFuture<'static, CacheResult<Value>> + Send + Sync>;

/// Registry of `(target, operation)` pairs to replayable handlers.
///
/// Populated at startup by the embedder; the refresher resolves the symbolic
/// identifiers stored in a [`RefreshDescriptor`](super::RefreshDescriptor)
/// through it, which keeps descriptors durable across restarts without any
/// dynamic invocation.
#[derive(Default)]
pub struct OperationRegistry {
    targets: HashMap<String, HashMap<String, OperationHandler>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `operation` on `target`.
    ///
    /// A later registration for the same pair replaces the earlier one.
    pub fn register<F, Fut>(&mut self, target: &str, operation: &str, handler: F)
    where
        F: Fn(CallContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CacheResult<Value>> + Send + 'static,
    {
        let handler: OperationHandler = Arc::new(move |ctx, args| Box::pin(handler(ctx, args)));
        self.targets
            .entry(target.to_owned())
            .or_default()
            .insert(operation.to_owned(), handler);
    }

    /// Resolves the handler for `(target, operation)`.
    ///
    /// Distinguishes a missing target from a missing operation so replay
    /// failures are attributable.
    pub fn resolve(&self, target: &str, operation: &str) -> CacheResult<OperationHandler> {
        let operations = self
            .targets
            .get(target)
            .ok_or_else(|| CacheError::UnknownTarget(target.to_owned()))?;
        operations.get(operation).cloned().ok_or_else(|| {
            CacheError::UnknownOperation(target.to_owned(), operation.to_owned())
        })
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let operations: usize = self.targets.values().map(|ops| ops.len()).sum();
        f.debug_struct("OperationRegistry")
            .field("targets", &self.targets.len())
            .field("operations", &operations)
            .finish()
    }
}
