// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration types.
//!
//! A [`CacheModule`] bundles the settings one provider is built from: the
//! environment name and up to two tier policies. Each policy renders to a
//! deterministic fingerprint string; the module's combined
//! [`fingerprint`](CacheModule::fingerprint) is what the factory uses to
//! decide whether two requests describe the same provider.

use std::any::TypeId;
use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use regioncache_store::{ExpiryType, StorePolicy};

/// Settings for the in-process tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPolicy {
    /// The default expiry kind applied to entries.
    pub expiry: ExpiryType,
    /// The window (sliding) or lifetime (absolute) of the default expiry.
    pub timeout: Duration,
}

impl LocalPolicy {
    /// Creates a policy with the given expiry kind and timeout.
    #[must_use]
    pub fn new(expiry: ExpiryType, timeout: Duration) -> Self {
        Self { expiry, timeout }
    }

    /// A policy that never expires entries.
    #[must_use]
    pub fn no_expiry() -> Self {
        Self::new(ExpiryType::None, Duration::ZERO)
    }

    /// The tier-level policy this configuration resolves to.
    #[must_use]
    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            kind: self.expiry,
            timeout: self.timeout,
        }
    }
}

impl fmt::Display for LocalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:?}", self.expiry, self.timeout)
    }
}

/// Settings for the shared Redis tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisPolicy {
    /// The default expiry kind applied to entries.
    pub expiry: ExpiryType,
    /// The window (sliding) or lifetime (absolute) of the default expiry.
    pub timeout: Duration,
    /// The endpoint, as a `redis://` connection string.
    pub connection_string: String,
    /// The Redis database index.
    pub database: i64,
}

impl RedisPolicy {
    /// Creates a policy for the given endpoint and database.
    #[must_use]
    pub fn new(
        expiry: ExpiryType,
        timeout: Duration,
        connection_string: impl Into<String>,
        database: i64,
    ) -> Self {
        Self {
            expiry,
            timeout,
            connection_string: connection_string.into(),
            database,
        }
    }

    /// The tier-level policy this configuration resolves to.
    #[must_use]
    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            kind: self.expiry,
            timeout: self.timeout,
        }
    }
}

impl fmt::Display for RedisPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:?}-{}-{}",
            self.expiry, self.timeout, self.connection_string, self.database
        )
    }
}

/// The settings one provider is built from.
///
/// A module names the environment (the first half of every region string)
/// and configures the in-process and shared tiers. Omitting a tier disables
/// it; a module with neither tier behaves like an unbounded local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheModule {
    environment: String,
    local: Option<LocalPolicy>,
    redis: Option<RedisPolicy>,
}

impl Default for CacheModule {
    /// A local-only module with no expiry and an empty environment name.
    fn default() -> Self {
        Self {
            environment: String::new(),
            local: Some(LocalPolicy::no_expiry()),
            redis: None,
        }
    }
}

impl CacheModule {
    /// Creates a local-only, no-expiry module for the given environment.
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Sets the in-process tier policy.
    #[must_use]
    pub fn with_local(mut self, local: LocalPolicy) -> Self {
        self.local = Some(local);
        self
    }

    /// Disables the in-process tier.
    #[must_use]
    pub fn without_local(mut self) -> Self {
        self.local = None;
        self
    }

    /// Sets the shared tier policy.
    #[must_use]
    pub fn with_redis(mut self, redis: RedisPolicy) -> Self {
        self.redis = Some(redis);
        self
    }

    /// The environment name prefixed to every region.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The in-process tier policy, if the tier is enabled.
    #[must_use]
    pub fn local(&self) -> Option<&LocalPolicy> {
        self.local.as_ref()
    }

    /// The shared tier policy, if the tier is enabled.
    #[must_use]
    pub fn redis(&self) -> Option<&RedisPolicy> {
        self.redis.as_ref()
    }

    /// A deterministic digest of the configured tiers.
    ///
    /// Two modules with equal fingerprints build providers with identical
    /// storage behavior, so the factory treats them as interchangeable.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(local) = &self.local {
            parts.push(format!("D-{local}"));
        }
        if let Some(redis) = &self.redis {
            parts.push(format!("R-{redis}"));
        }
        parts.join("-")
    }
}

/// A record for batch-registering invalidators ahead of provider use.
#[derive(Debug, Clone)]
pub struct InvalidatorConfig {
    /// The scope half of the invalidator's region, usually a type name.
    pub invalidator_key: String,
    /// The environment half of the invalidator's region.
    pub environment: String,
    /// The shared tier the invalidator broadcasts through.
    pub redis: RedisPolicy,
}

/// Process-scoped configuration: one default module plus per-type overrides.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    default: RwLock<CacheModule>,
    overrides: DashMap<TypeId, CacheModule>,
}

impl ConfigRegistry {
    /// Creates a registry holding the default [`CacheModule`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the default module.
    pub fn set_default(&self, module: CacheModule) {
        *self.default.write() = module;
    }

    /// Returns a copy of the default module.
    #[must_use]
    pub fn default_module(&self) -> CacheModule {
        self.default.read().clone()
    }

    /// Registers a module override for values of type `T`.
    pub fn add_module<T: 'static>(&self, module: CacheModule) {
        self.overrides.insert(TypeId::of::<T>(), module);
    }

    /// Returns the module governing values of type `T`: the per-type
    /// override if one was registered, the default otherwise.
    #[must_use]
    pub fn module_for<T: 'static>(&self) -> CacheModule {
        self.overrides
            .get(&TypeId::of::<T>())
            .map_or_else(|| self.default_module(), |module| module.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_fingerprints_are_deterministic() {
        let local = LocalPolicy::new(ExpiryType::Sliding, Duration::from_secs(600));
        assert_eq!(local.to_string(), "Sliding-600s");

        let redis = RedisPolicy::new(
            ExpiryType::Sliding,
            Duration::from_secs(600),
            "redis://localhost",
            2,
        );
        assert_eq!(redis.to_string(), "Sliding-600s-redis://localhost-2");
    }

    #[test]
    fn module_fingerprint_joins_configured_tiers() {
        let local = LocalPolicy::no_expiry();
        let redis = RedisPolicy::new(ExpiryType::None, Duration::ZERO, "redis://localhost", 0);

        assert_eq!(CacheModule::new("Test").fingerprint(), "D-None-0ns");
        assert_eq!(
            CacheModule::new("Test").without_local().with_redis(redis.clone()).fingerprint(),
            "R-None-0ns-redis://localhost-0"
        );
        assert_eq!(
            CacheModule::new("Test")
                .with_local(local)
                .with_redis(redis)
                .fingerprint(),
            "D-None-0ns-R-None-0ns-redis://localhost-0"
        );
    }

    #[test]
    fn modules_with_different_settings_have_different_fingerprints() {
        let a = CacheModule::new("Test")
            .with_local(LocalPolicy::new(ExpiryType::Sliding, Duration::from_secs(60)));
        let b = CacheModule::new("Test")
            .with_local(LocalPolicy::new(ExpiryType::Sliding, Duration::from_secs(90)));

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn registry_prefers_per_type_override() {
        struct Marker;

        let registry = ConfigRegistry::new();
        registry.set_default(CacheModule::new("Default"));
        registry.add_module::<Marker>(CacheModule::new("Override"));

        assert_eq!(registry.module_for::<Marker>().environment(), "Override");
        assert_eq!(registry.module_for::<String>().environment(), "Default");
    }
}
