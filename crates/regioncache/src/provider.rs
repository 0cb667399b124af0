// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The typed caching façade.

use std::sync::Arc;

use regioncache_store::{Expiration, RegionStore, Result};

use crate::invalidator::Invalidator;
use crate::version_key;

/// A cached value together with its version.
///
/// Absence is expressed through the `value` field being `None`; the version
/// sentinel for an absent entry is `0`, so versions of present entries
/// should start at `1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The cached value, if present.
    pub value: Option<T>,
    /// The value's version; `0` when absent.
    pub version: i64,
}

impl<T> Versioned<T> {
    /// Creates a present entry.
    #[must_use]
    pub fn new(value: T, version: i64) -> Self {
        Self {
            value: Some(value),
            version,
        }
    }

    /// The absent entry.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            value: None,
            version: 0,
        }
    }

    /// Whether the entry holds a value.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> Default for Versioned<T> {
    fn default() -> Self {
        Self::absent()
    }
}

/// A typed cache scoped to one region.
///
/// A provider owns a value store and a version store (the version of a
/// versioned entry lives under a second key, `"{key}-Version"`, never
/// inside the value itself) and optionally an [`Invalidator`] that mirrors
/// removals to other processes. The stores may be a single tier or a
/// [`LayeredStore`](crate::LayeredStore); the provider does not care.
///
/// Providers are cheap to share and usually obtained from the
/// [`CacheFactory`](crate::CacheFactory), which hands out one instance per
/// (value type, region, settings) triple.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use regioncache::CacheProvider;
/// use regioncache_memory::MemoryStore;
///
/// # futures::executor::block_on(async {
/// let provider = CacheProvider::new(
///     "Test-Users",
///     Arc::new(MemoryStore::<String>::new()),
///     Arc::new(MemoryStore::<i64>::new()),
///     None,
/// );
///
/// provider.set("alice", "profile".to_owned()).await?;
/// assert_eq!(provider.get("alice").await?.as_deref(), Some("profile"));
/// # Ok::<(), regioncache::Error>(())
/// # });
/// ```
pub struct CacheProvider<T> {
    region: String,
    values: Arc<dyn RegionStore<T>>,
    versions: Arc<dyn RegionStore<i64>>,
    invalidator: Option<Arc<Invalidator>>,
}

impl<T> std::fmt::Debug for CacheProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheProvider")
            .field("region", &self.region)
            .field("invalidator", &self.invalidator)
            .finish_non_exhaustive()
    }
}

impl<T> CacheProvider<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a provider over the given stores.
    ///
    /// A provider without an invalidator skips cross-process mirroring:
    /// [`remove`](Self::remove) only touches its own stores and
    /// [`clear`](Self::clear) is a no-op success.
    #[must_use]
    pub fn new(
        region: impl Into<String>,
        values: Arc<dyn RegionStore<T>>,
        versions: Arc<dyn RegionStore<i64>>,
        invalidator: Option<Arc<Invalidator>>,
    ) -> Self {
        Self {
            region: region.into(),
            values,
            versions,
            invalidator,
        }
    }

    /// The region this provider addresses.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The invalidator mirroring this provider's removals, if any.
    #[must_use]
    pub fn invalidator(&self) -> Option<&Arc<Invalidator>> {
        self.invalidator.as_ref()
    }

    /// Returns the cached value for `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn get(&self, key: &str) -> Result<Option<T>> {
        self.values.get(key, &self.region).await
    }

    /// Returns the version of the entry under `key`, `0` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn get_version(&self, key: &str) -> Result<i64> {
        let version = self.versions.get(&version_key(key), &self.region).await?;
        Ok(version.unwrap_or(0))
    }

    /// Returns the value and version under `key` as one entity.
    ///
    /// Always returns an entity; an absent entry comes back as
    /// [`Versioned::absent`].
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn get_versioned(&self, key: &str) -> Result<Versioned<T>> {
        let value = self.get(key).await?;
        let version = self.get_version(key).await?;
        Ok(Versioned { value, version })
    }

    /// Cache-aside read-through: returns the cached value, or fetches,
    /// caches, and returns it.
    ///
    /// The fetch runs at most once per call and never on a hit. A `None`
    /// fetch result is returned as-is and not cached. Concurrent callers
    /// missing on the same key each run their own fetch; the last write
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Option<T>> + Send,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(Some(value));
        }

        let Some(value) = fetch().await else {
            return Ok(None);
        };
        self.set(key, value.clone()).await?;
        Ok(Some(value))
    }

    /// Versioned cache-aside read-through.
    ///
    /// Presence is judged on the entity's value field. A fetched entity
    /// with a present value is written through
    /// [`set_versioned`](Self::set_versioned); an absent fetch result is
    /// returned as-is and not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn get_versioned_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Versioned<T>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Versioned<T>> + Send,
    {
        let cached = self.get_versioned(key).await?;
        if cached.is_present() {
            return Ok(cached);
        }

        let fetched = fetch().await;
        if let Some(value) = &fetched.value {
            self.set_versioned(key, value.clone(), fetched.version).await?;
        }
        Ok(fetched)
    }

    /// Stores a value under `key`, dropping any per-entry expiry override
    /// so the tier default governs the fresh write.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn set(&self, key: &str, value: T) -> Result<()> {
        self.values.remove_expiration(key, &self.region).await?;
        self.values.put(key, &self.region, value).await
    }

    /// Stores a value under `key` with an explicit expiry for that entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn set_expiring(&self, key: &str, value: T, expiration: Expiration) -> Result<()> {
        self.values.put(key, &self.region, value).await?;
        self.values.expire(key, &self.region, expiration).await
    }

    /// Stores a value and its version.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn set_versioned(&self, key: &str, value: T, version: i64) -> Result<()> {
        self.set(key, value).await?;

        let vkey = version_key(key);
        self.versions.remove_expiration(&vkey, &self.region).await?;
        self.versions.put(&vkey, &self.region, version).await
    }

    /// Stores a value and its version with an explicit expiry on both keys.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn set_versioned_expiring(
        &self,
        key: &str,
        value: T,
        version: i64,
        expiration: Expiration,
    ) -> Result<()> {
        self.set_expiring(key, value, expiration).await?;

        let vkey = version_key(key);
        self.versions.put(&vkey, &self.region, version).await?;
        self.versions.expire(&vkey, &self.region, expiration).await
    }

    /// Removes the entry under `key`, mirroring the removal through the
    /// invalidator when one is attached.
    ///
    /// Returns the logical AND of all steps that ran: `true` only if every
    /// store that was asked reported the key present.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.values.remove_expiration(key, &self.region).await?;
        let mut removed = self.values.remove(key, &self.region).await?;
        if let Some(invalidator) = &self.invalidator {
            removed &= invalidator.remove(key).await?;
        }
        Ok(removed)
    }

    /// Removes a versioned entry, both keys, mirroring both removals
    /// through the invalidator when one is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub async fn remove_versioned(&self, key: &str) -> Result<bool> {
        self.values.remove_expiration(key, &self.region).await?;
        let mut removed = self.values.remove(key, &self.region).await?;

        let vkey = version_key(key);
        self.versions.remove_expiration(&vkey, &self.region).await?;
        removed &= self.versions.remove(&vkey, &self.region).await?;
        if let Some(invalidator) = &self.invalidator {
            removed &= invalidator.remove(key).await?;
            removed &= invalidator.remove_versioned(key).await?;
        }
        Ok(removed)
    }

    /// Clears the region through the invalidator.
    ///
    /// The clear is broadcast-only: it addresses the shared store so every
    /// process sees it, and does not touch this provider's local tier.
    /// Without an invalidator this is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared store rejects the clear.
    pub async fn clear(&self) -> Result<()> {
        match &self.invalidator {
            Some(invalidator) => invalidator.clear().await,
            None => Ok(()),
        }
    }
}
