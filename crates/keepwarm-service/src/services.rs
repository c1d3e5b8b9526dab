//! Wires the engine components together and owns them.
//!
//! [`SharedServices`] initializes the cache pool, access recorder, refresher
//! and registrar according to the provided [`Config`], and registers the
//! periodic sweep-then-refresh task when a schedule is configured. Nothing in
//! the engine is ambient global state; collaborators receive handles from
//! here.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::caching::{
    AccessRecorder, CacheManager, CachePool, Evaluator, KeyGenerator, OperationRegistry,
    RefreshRegistrar, Refresher, SharedStore, spawn_scheduler,
};
use crate::config::Config;

pub struct SharedServices {
    pub config: Config,
    pub pool: Arc<CachePool>,
    pub access: Arc<AccessRecorder>,
    pub refresher: Arc<Refresher>,
    pub registrar: Arc<RefreshRegistrar>,
    scheduler: Option<JoinHandle<()>>,
}

impl SharedServices {
    /// Creates the engine from its embedder-provided collaborators.
    ///
    /// `key_generators` are registered with the registrar in addition to the
    /// built-in structural generator, so annotation-level `key_generator`
    /// names can refer to them.
    pub fn new(
        config: Config,
        store: Arc<dyn SharedStore>,
        registry: OperationRegistry,
        evaluator: Arc<dyn Evaluator>,
        key_generators: impl IntoIterator<Item = (String, Arc<dyn KeyGenerator>)>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self> {
        let project = config.project.clone();

        let manager = CacheManager::new(Arc::clone(&store), project.clone());
        let pool = Arc::new(CachePool::new(manager));

        let access = Arc::new(AccessRecorder::new(Arc::clone(&store), project.as_deref()));
        let registry = Arc::new(registry);
        let refresher = Arc::new(Refresher::new(
            store,
            registry,
            Arc::clone(&access),
            &config,
            &runtime,
        ));
        let mut registrar = RefreshRegistrar::new(Arc::clone(&refresher), evaluator);
        for (name, generator) in key_generators {
            registrar.register_key_generator(&name, generator);
        }
        let registrar = Arc::new(registrar);

        let scheduler = if config.task_enabled {
            spawn_scheduler(Arc::clone(&refresher), config.schedule, &runtime)
        } else {
            None
        };

        Ok(Self {
            config,
            pool,
            access,
            refresher,
            registrar,
            scheduler,
        })
    }

    /// Whether a periodic sweep-then-refresh task is running.
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_some()
    }
}

impl Drop for SharedServices {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::caching::{
        CacheResult, CacheableConfig, CallContext, InvocationContext, MemoryStore,
    };
    use crate::test;

    use super::*;

    struct NoExpressions;

    impl Evaluator for NoExpressions {
        fn evaluate_bool(
            &self,
            expression: &str,
            _invocation: &InvocationContext,
        ) -> CacheResult<bool> {
            Err(crate::caching::CacheError::Evaluation(expression.into()))
        }

        fn evaluate_key(
            &self,
            expression: &str,
            _invocation: &InvocationContext,
        ) -> CacheResult<String> {
            Err(crate::caching::CacheError::Evaluation(expression.into()))
        }
    }

    fn services_with_generators(
        config: Config,
        key_generators: Vec<(String, Arc<dyn KeyGenerator>)>,
    ) -> (SharedServices, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut registry = OperationRegistry::new();
        registry.register("Order", "getById", |_ctx, _args| async {
            Ok(json!({ "id": 42 }))
        });
        let services = SharedServices::new(
            config,
            Arc::clone(&store) as Arc<dyn SharedStore>,
            registry,
            Arc::new(NoExpressions),
            key_generators,
            tokio::runtime::Handle::current(),
        )
        .unwrap();
        (services, store)
    }

    fn services(config: Config) -> (SharedServices, Arc<MemoryStore>) {
        services_with_generators(config, Vec::new())
    }

    #[tokio::test]
    async fn test_scheduler_requires_schedule() {
        test::setup();

        let (services, _) = services(Config::default());
        assert!(!services.is_scheduled());

        let (services, _) = self::services(Config {
            schedule: Some(Duration::from_millis(50)),
            task_enabled: false,
            ..Default::default()
        });
        assert!(!services.is_scheduled());

        let (services, _) = self::services(Config {
            schedule: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        assert!(services.is_scheduled());
    }

    #[tokio::test]
    async fn test_custom_key_generator_through_wiring() {
        test::setup();

        struct FixedKey;

        impl KeyGenerator for FixedKey {
            fn generate(
                &self,
                _target: &str,
                _operation: &str,
                _args: &[serde_json::Value],
            ) -> String {
                "fixed".into()
            }
        }

        let (services, store) = services_with_generators(
            Config::default(),
            vec![(
                "custom".to_owned(),
                Arc::new(FixedKey) as Arc<dyn KeyGenerator>,
            )],
        );

        let invocation = InvocationContext {
            target: "Order".into(),
            operation: "getById".into(),
            arg_types: vec!["i64".into()],
            args: vec![json!(42)],
            call: CallContext::default(),
        };
        let cacheable = CacheableConfig {
            ttl: 60,
            auto_refresh_without_unless: true,
            key_generator: "custom".into(),
            ..Default::default()
        };
        services
            .registrar
            .mark_auto_refresh(&invocation, &cacheable, "orders")
            .await
            .unwrap();

        assert!(store.hash_value("refresh", "orders::fixed").is_some());
    }

    #[tokio::test]
    async fn test_scheduled_refresh_end_to_end() {
        test::setup();

        let (services, store) = services(Config {
            schedule: Some(Duration::from_millis(50)),
            ..Default::default()
        });

        let invocation = InvocationContext {
            target: "Order".into(),
            operation: "getById".into(),
            arg_types: vec!["i64".into()],
            args: vec![json!(42)],
            call: CallContext::default(),
        };
        let cacheable = CacheableConfig {
            ttl: 60,
            auto_refresh_without_unless: true,
            ..Default::default()
        };
        services
            .registrar
            .mark_auto_refresh(&invocation, &cacheable, "orders")
            .await
            .unwrap();

        // The next tick sweeps (a no-op without a window) and replays the
        // registered key.
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.flat_value("orders::[42]").is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(store.flat_value("orders::[42]"), Some(json!({ "id": 42 })));
    }
}
