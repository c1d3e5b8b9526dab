use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::descriptor::RefreshDescriptor;
use super::error::{CacheError, CacheResult};
use super::key::{KeyGenerator, STRUCTURAL_KEY_GENERATOR, StructuralKeyGenerator, simple_args_key};
use super::refresher::Refresher;
use super::registry::CallContext;

/// Annotation-level cache configuration for one cacheable operation, as
/// extracted by the (external) interception layer.
#[derive(Debug, Clone, Default)]
pub struct CacheableConfig {
    /// Entry TTL in seconds; non-positive entries are never auto-refreshed.
    pub ttl: i64,
    /// Whether the key should be kept warm (given no `unless` is set).
    pub auto_refresh_without_unless: bool,
    /// Condition expression; empty defaults to true.
    pub condition: String,
    /// Post-hoc exclusion expression. When set, auto-refresh is impossible:
    /// the post-invocation result is not available at registration time.
    pub unless: String,
    /// Key expression; empty defaults to a structural key of the arguments.
    pub key: String,
    /// Named key-generator selector; empty selects the key expression path.
    pub key_generator: String,
}

/// One intercepted call, as handed over by the interception layer.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Identifier of the target the operation lives on.
    pub target: String,
    /// Name of the invoked operation.
    pub operation: String,
    /// Ordered parameter type identifiers.
    pub arg_types: Vec<String>,
    /// Ordered argument values.
    pub args: Vec<Value>,
    /// The propagated call context.
    pub call: CallContext,
}

/// The condition/key expression evaluator, provided by the embedder.
///
/// Given an expression string and an invocation, returns a typed value.
/// The registrar never calls it with an empty expression; the documented
/// defaults are applied without touching the evaluator.
pub trait Evaluator: Send + Sync {
    fn evaluate_bool(&self, expression: &str, invocation: &InvocationContext) -> CacheResult<bool>;

    fn evaluate_key(&self, expression: &str, invocation: &InvocationContext)
    -> CacheResult<String>;
}

/// Decides, per call, whether a refresh descriptor must be (re-)stored.
pub struct RefreshRegistrar {
    refresher: Arc<Refresher>,
    evaluator: Arc<dyn Evaluator>,
    key_generators: HashMap<String, Arc<dyn KeyGenerator>>,
}

impl RefreshRegistrar {
    pub fn new(refresher: Arc<Refresher>, evaluator: Arc<dyn Evaluator>) -> Self {
        let mut registrar = Self {
            refresher,
            evaluator,
            key_generators: HashMap::new(),
        };
        registrar.register_key_generator(STRUCTURAL_KEY_GENERATOR, Arc::new(StructuralKeyGenerator));
        registrar
    }

    /// Registers a named key generator selectable via
    /// [`CacheableConfig::key_generator`].
    pub fn register_key_generator(&mut self, name: &str, generator: Arc<dyn KeyGenerator>) {
        self.key_generators.insert(name.to_owned(), generator);
    }

    /// Marks the key of this invocation for auto-refresh if it qualifies.
    ///
    /// Evaluation failures propagate to the caller: they indicate a
    /// configuration defect, not a runtime hiccup.
    pub async fn mark_auto_refresh(
        &self,
        invocation: &InvocationContext,
        cacheable: &CacheableConfig,
        cache_name: &str,
    ) -> CacheResult<()> {
        if !cacheable.auto_refresh_without_unless {
            return Ok(());
        }
        if !cacheable.unless.is_empty() {
            tracing::warn!(
                cache_name,
                key = %cacheable.key,
                "`unless` is set, auto-refresh disabled: the result is not available at registration time",
            );
            return Ok(());
        }

        if !cacheable.condition.is_empty()
            && !self
                .evaluator
                .evaluate_bool(&cacheable.condition, invocation)?
        {
            return Ok(());
        }

        let key = self.resolve_key(invocation, cacheable)?;
        let store_key = format!("{cache_name}::{key}");
        let descriptor = RefreshDescriptor {
            target: invocation.target.clone(),
            operation: invocation.operation.clone(),
            arg_types: invocation.arg_types.clone(),
            args: invocation.args.clone(),
            key: store_key,
            ttl: cacheable.ttl,
        };
        self.refresher.add_cache(descriptor, invocation.call).await
    }

    fn resolve_key(
        &self,
        invocation: &InvocationContext,
        cacheable: &CacheableConfig,
    ) -> CacheResult<String> {
        if !cacheable.key_generator.is_empty() {
            let generator = self.key_generators.get(&cacheable.key_generator).ok_or_else(|| {
                CacheError::Evaluation(format!(
                    "no key generator named `{}` is registered",
                    cacheable.key_generator
                ))
            })?;
            return Ok(generator.generate(
                &invocation.target,
                &invocation.operation,
                &invocation.args,
            ));
        }

        if cacheable.key.is_empty() {
            return Ok(simple_args_key(&invocation.args));
        }
        self.evaluator.evaluate_key(&cacheable.key, invocation)
    }
}
