// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Provider and invalidator construction with identity caching.

use std::any::{Any, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::{DashMap, DashSet};
use regioncache_memory::MemoryStore;
use regioncache_redis::{ConnectionManager, ConnectionMonitor, DEFAULT_PROBE_INTERVAL, RedisStore, connect};
use regioncache_store::{ConnectionGuard, RegionStore, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::{CacheModule, ConfigRegistry, InvalidatorConfig, RedisPolicy};
use crate::invalidator::Invalidator;
use crate::layered::LayeredStore;
use crate::provider::CacheProvider;

/// Hands out providers and invalidators by identity.
///
/// Two requests for the same value type, region, and settings fingerprint
/// return the same provider instance; requests differing in any of the
/// three get distinct instances. The factory is an explicit object rather
/// than a process global, so tests create fresh ones freely.
///
/// Concurrent first requests for the same identity may race; the last
/// construction wins the cache slot and earlier winners stay usable on
/// their own. Providers built on the same endpoint always share one
/// [`ConnectionGuard`] regardless of such races.
///
/// # Examples
///
/// ```
/// use regioncache::{CacheFactory, CacheModule};
///
/// # async fn demo() -> Result<(), regioncache::Error> {
/// let factory = CacheFactory::new();
/// factory.setup(CacheModule::new("Prod"));
///
/// let by_type = factory.provider::<u64>().await?;
/// let by_region = factory.provider_in::<u64>("Counters").await?;
/// assert_ne!(by_type.region(), by_region.region());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct CacheFactory {
    config: ConfigRegistry,
    providers: DashMap<String, Arc<dyn Any + Send + Sync>>,
    invalidators: DashMap<String, Arc<Invalidator>>,
    connections: Connections,
    shared_telemetry: AtomicBool,
}

impl std::fmt::Debug for CacheFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFactory")
            .field("providers", &self.providers.len())
            .field("invalidators", &self.invalidators.len())
            .finish_non_exhaustive()
    }
}

impl CacheFactory {
    /// Creates a factory with the default (local-only, no-expiry) module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the default module and starts a fresh provider epoch.
    ///
    /// Both identity caches are cleared, so later requests build fresh
    /// instances against the new settings. Providers already handed out
    /// remain usable. Shared connections and their guards are
    /// process-lifetime and survive the reset.
    pub fn setup(&self, module: CacheModule) {
        self.config.set_default(module);
        self.providers.clear();
        self.invalidators.clear();
    }

    /// Shorthand for [`setup`](Self::setup) with a local-only module for
    /// the given environment.
    pub fn setup_environment(&self, environment: &str) {
        self.setup(CacheModule::new(environment));
    }

    /// Registers a module override for values of type `T`.
    ///
    /// Does not reset the provider epoch; already-cached providers for `T`
    /// keep their settings until the next [`setup`](Self::setup).
    pub fn add_module<T: 'static>(&self, module: CacheModule) {
        self.config.add_module::<T>(module);
    }

    /// Returns the module governing values of type `T`.
    #[must_use]
    pub fn module_for<T: 'static>(&self) -> CacheModule {
        self.config.module_for::<T>()
    }

    /// Enables per-command tracing on shared stores created from now on.
    pub fn enable_shared_telemetry(&self) {
        self.shared_telemetry.store(true, Ordering::Release);
    }

    /// Returns the provider for values of type `T`, scoped by type name.
    ///
    /// # Errors
    ///
    /// Returns an error if a shared connection cannot be established.
    pub async fn provider<T>(&self) -> Result<Arc<CacheProvider<T>>>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.provider_with(None, None).await
    }

    /// Returns the provider for values of type `T` in an explicit region.
    ///
    /// # Errors
    ///
    /// Returns an error if a shared connection cannot be established.
    pub async fn provider_in<T>(&self, region: &str) -> Result<Arc<CacheProvider<T>>>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.provider_with(None, Some(region)).await
    }

    /// Returns a provider with explicit settings and/or region.
    ///
    /// Settings resolve in precedence order: the explicit `module`, then a
    /// per-type override, then the default. The identity under which the
    /// provider is cached combines the region scope with the resolved
    /// module's fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if a shared connection cannot be established.
    pub async fn provider_with<T>(
        &self,
        module: Option<CacheModule>,
        region: Option<&str>,
    ) -> Result<Arc<CacheProvider<T>>>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let module = module.unwrap_or_else(|| self.config.module_for::<T>());
        let scope = region.map_or_else(|| type_name::<T>().to_owned(), str::to_owned);
        let identity = format!("{scope}-{}", module.fingerprint());

        if let Some(cached) = self.providers.get(&identity) {
            // A mismatched value type under the same identity falls
            // through to construction.
            if let Ok(provider) = Arc::clone(&cached).downcast::<CacheProvider<T>>() {
                return Ok(provider);
            }
        }

        let provider = Arc::new(self.build_provider::<T>(&module, &scope).await?);
        self.providers
            .insert(identity, Arc::clone(&provider) as Arc<dyn Any + Send + Sync>);
        Ok(provider)
    }

    /// Returns a standalone invalidator for the given scope, or `None`
    /// when the governing module has no shared tier.
    ///
    /// This is the path for invalidating by scope name alone, from a
    /// process that holds no typed provider; providers construct their
    /// own invalidator and never consult this cache. Standalone
    /// invalidators are cached per (scope, endpoint, database); every
    /// caller naming the same triple shares one buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if a shared connection cannot be established.
    pub async fn invalidator(
        &self,
        scope: &str,
        module: Option<CacheModule>,
    ) -> Result<Option<Arc<Invalidator>>> {
        let module = module.unwrap_or_else(|| self.config.default_module());
        let Some(policy) = module.redis() else {
            return Ok(None);
        };

        let identity = invalidator_identity(scope, policy);
        if let Some(cached) = self.invalidators.get(&identity) {
            return Ok(Some(Arc::clone(&cached)));
        }

        let invalidator = self
            .build_invalidator(module.environment(), scope, policy)
            .await?;
        self.invalidators.insert(identity, Arc::clone(&invalidator));
        Ok(Some(invalidator))
    }

    /// Batch-registers invalidators ahead of provider use.
    ///
    /// Each record constructs (or replaces) the invalidator for its key,
    /// so restoration replay is armed even before any provider touches
    /// the region.
    ///
    /// # Errors
    ///
    /// Returns an error if a shared connection cannot be established.
    pub async fn setup_invalidators(
        &self,
        configs: impl IntoIterator<Item = InvalidatorConfig>,
    ) -> Result<()> {
        for config in configs {
            let identity = invalidator_identity(&config.invalidator_key, &config.redis);
            let invalidator = self
                .build_invalidator(&config.environment, &config.invalidator_key, &config.redis)
                .await?;
            self.invalidators.insert(identity, invalidator);
        }
        Ok(())
    }

    async fn build_invalidator(
        &self,
        environment: &str,
        scope: &str,
        policy: &RedisPolicy,
    ) -> Result<Arc<Invalidator>> {
        let (store, guard) = self.shared_store(policy).await?;
        Ok(Invalidator::shared(environment, scope, Arc::new(store), guard))
    }

    async fn shared_store(&self, policy: &RedisPolicy) -> Result<(RedisStore, Arc<ConnectionGuard>)> {
        let manager = self
            .connections
            .manager(&policy.connection_string, policy.database)
            .await?;
        let guard = self.connections.guard(&policy.connection_string);
        let store = RedisStore::new(manager, policy.store_policy(), Arc::clone(&guard))
            .traced(self.shared_telemetry.load(Ordering::Acquire));
        Ok((store, guard))
    }

    async fn build_provider<T>(&self, module: &CacheModule, scope: &str) -> Result<CacheProvider<T>>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let region = format!("{}-{}", module.environment(), scope);

        let shared = match module.redis() {
            Some(policy) => Some(self.shared_store(policy).await?),
            None => None,
        };

        let (values, versions): (Arc<dyn RegionStore<T>>, Arc<dyn RegionStore<i64>>) =
            match (module.local(), &shared) {
                (Some(local), Some((redis, _))) => (
                    Arc::new(LayeredStore::new(
                        Arc::new(MemoryStore::<T>::with_policy(local.store_policy())),
                        Arc::new(redis.clone()),
                    )),
                    Arc::new(LayeredStore::new(
                        Arc::new(MemoryStore::<i64>::with_policy(local.store_policy())),
                        Arc::new(redis.clone()),
                    )),
                ),
                (Some(local), None) => (
                    Arc::new(MemoryStore::<T>::with_policy(local.store_policy())),
                    Arc::new(MemoryStore::<i64>::with_policy(local.store_policy())),
                ),
                (None, Some((redis, _))) => (Arc::new(redis.clone()), Arc::new(redis.clone())),
                // No tier configured at all: fall back to an unbounded
                // local cache so the provider still functions.
                (None, None) => (
                    Arc::new(MemoryStore::<T>::new()),
                    Arc::new(MemoryStore::<i64>::new()),
                ),
            };

        // The provider owns its invalidator outright, built from the same
        // module so both always address the same region. Only standalone
        // lookups go through the identity cache.
        let invalidator = shared.as_ref().map(|(store, guard)| {
            Invalidator::shared(
                module.environment(),
                scope,
                Arc::new(store.clone()),
                Arc::clone(guard),
            )
        });

        Ok(CacheProvider::new(region, values, versions, invalidator))
    }
}

fn invalidator_identity(scope: &str, policy: &RedisPolicy) -> String {
    format!("{scope}-{}-{}", policy.connection_string, policy.database)
}

/// Process-lifetime registry of shared connections.
///
/// One connection per (endpoint, database) pair; one guard and one monitor
/// per endpoint, shared by every store and invalidator on it. Nothing in
/// here is ever torn down.
#[derive(Default)]
struct Connections {
    guards: DashMap<String, Arc<ConnectionGuard>>,
    managers: DashMap<(String, i64), ConnectionManager>,
    monitored: DashSet<String>,
}

impl Connections {
    fn guard(&self, connection_string: &str) -> Arc<ConnectionGuard> {
        Arc::clone(
            &self
                .guards
                .entry(connection_string.to_owned())
                .or_insert_with(|| Arc::new(ConnectionGuard::new())),
        )
    }

    async fn manager(&self, connection_string: &str, database: i64) -> Result<ConnectionManager> {
        let key = (connection_string.to_owned(), database);
        if let Some(manager) = self.managers.get(&key) {
            return Ok(manager.clone());
        }

        let manager = connect(connection_string, database).await?;
        if self.monitored.insert(connection_string.to_owned()) {
            ConnectionMonitor::spawn(
                manager.clone(),
                self.guard(connection_string),
                DEFAULT_PROBE_INTERVAL,
            );
        }
        Ok(self.managers.entry(key).or_insert(manager).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regioncache_store::ExpiryType;
    use regioncache_store::testing::MockRegionStore;

    use super::*;

    fn redis_policy() -> RedisPolicy {
        RedisPolicy::new(
            ExpiryType::Sliding,
            Duration::from_secs(600),
            "redis://localhost",
            2,
        )
    }

    fn mock_invalidator(environment: &str, scope: &str) -> Arc<Invalidator> {
        Invalidator::shared(
            environment,
            scope,
            Arc::new(MockRegionStore::<i32>::new()),
            Arc::new(ConnectionGuard::new()),
        )
    }

    #[test]
    fn invalidator_identity_names_the_full_triple() {
        assert_eq!(
            invalidator_identity("Users", &redis_policy()),
            "Users-redis://localhost-2"
        );
    }

    #[test]
    fn shared_telemetry_is_off_until_enabled() {
        let factory = CacheFactory::new();
        assert!(!factory.shared_telemetry.load(Ordering::Acquire));

        factory.enable_shared_telemetry();
        assert!(factory.shared_telemetry.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn registered_invalidators_are_found_without_connecting() {
        let factory = CacheFactory::new();
        factory.setup(CacheModule::new("Test").with_redis(redis_policy()));

        let armed = mock_invalidator("Test", "Users");
        factory
            .invalidators
            .insert(invalidator_identity("Users", &redis_policy()), Arc::clone(&armed));

        let found = factory.invalidator("Users", None).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &armed));
        assert_eq!(found.region(), "Test-Users");
    }

    #[tokio::test]
    async fn reregistering_a_key_replaces_the_armed_invalidator() {
        let factory = CacheFactory::new();
        factory.setup(CacheModule::new("Test").with_redis(redis_policy()));

        let identity = invalidator_identity("Users", &redis_policy());
        let first = mock_invalidator("Test", "Users");
        let second = mock_invalidator("Test", "Users");
        factory.invalidators.insert(identity.clone(), Arc::clone(&first));
        factory.invalidators.insert(identity, Arc::clone(&second));

        let found = factory.invalidator("Users", None).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert!(!Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn setup_discards_registered_invalidators() {
        let factory = CacheFactory::new();
        factory
            .invalidators
            .insert(invalidator_identity("Users", &redis_policy()), mock_invalidator("Test", "Users"));

        factory.setup(CacheModule::new("Test"));
        assert!(factory.invalidators.is_empty());
    }

    #[tokio::test]
    async fn local_only_module_yields_no_standalone_invalidator() {
        let factory = CacheFactory::new();
        factory.setup(CacheModule::new("Test"));

        assert!(factory.invalidator("Users", None).await.unwrap().is_none());
    }
}
