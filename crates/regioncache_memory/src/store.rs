// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The moka-backed region store.

use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;

use regioncache_store::{Expiration, ExpiryType, RegionStore, Result, StorePolicy};

use crate::builder::MemoryStoreBuilder;

/// How a single entry relates to the tier's default expiry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotExpiry {
    /// The tier default governs this entry.
    Default,
    /// A per-entry override installed via `expire`.
    Override(Expiration),
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    expiry: SlotExpiry,
}

/// Maps a per-entry override to a moka time-to-live, measured from now.
fn override_ttl(expiration: Expiration) -> Option<Duration> {
    match expiration {
        Expiration::None => None,
        Expiration::Sliding(window) => Some(window),
        Expiration::Absolute(deadline) => Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        ),
    }
}

/// Per-entry expiry hook handed to moka.
///
/// Sliding entries refresh their window on every read. An absolute tier
/// default expires each entry `timeout` after its write; an absolute
/// override expires at its wall-clock deadline. `Expiration::None`
/// overrides disable expiry even when the tier default would apply.
struct PerEntryExpiry {
    default: StorePolicy,
}

impl PerEntryExpiry {
    fn write_ttl<V>(&self, slot: &Slot<V>) -> Option<Duration> {
        match slot.expiry {
            SlotExpiry::Default => match self.default.kind {
                ExpiryType::None => None,
                ExpiryType::Sliding | ExpiryType::Absolute => Some(self.default.timeout),
            },
            SlotExpiry::Override(expiration) => override_ttl(expiration),
        }
    }

    fn sliding_window<V>(&self, slot: &Slot<V>) -> Option<Duration> {
        match slot.expiry {
            SlotExpiry::Default => match self.default.kind {
                ExpiryType::Sliding => Some(self.default.timeout),
                _ => None,
            },
            SlotExpiry::Override(expiration) => expiration.sliding_window(),
        }
    }
}

impl<V> Expiry<String, Slot<V>> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot<V>, _created_at: Instant) -> Option<Duration> {
        self.write_ttl(slot)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        slot: &Slot<V>,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match self.sliding_window(slot) {
            Some(window) => Some(window),
            None => duration_until_expiry,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.write_ttl(slot)
    }
}

/// An in-process store tier backed by moka.
///
/// Each region is served by its own moka cache, created lazily on first
/// use, so clearing one region never disturbs another. The store is cheap
/// to share: all operations take `&self`.
///
/// # Examples
///
/// ```
/// use regioncache_memory::MemoryStore;
/// use regioncache_store::RegionStore;
/// # futures::executor::block_on(async {
///
/// let store = MemoryStore::<i32>::new();
///
/// store.put("key", "region", 42).await?;
/// assert_eq!(store.get("key", "region").await?, Some(42));
/// # Ok::<(), regioncache_store::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    regions: DashMap<String, Cache<String, Slot<V>>>,
    max_capacity: Option<u64>,
    default_policy: StorePolicy,
}

impl<V> Default for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new unbounded store with no default expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new store with the given default expiry policy.
    #[must_use]
    pub fn with_policy(policy: StorePolicy) -> Self {
        Self::builder().policy(policy).build()
    }

    /// Creates a new builder for configuring a store.
    #[must_use]
    pub fn builder() -> MemoryStoreBuilder<V> {
        MemoryStoreBuilder::new()
    }

    pub(crate) fn from_builder(builder: &MemoryStoreBuilder<V>) -> Self {
        Self {
            regions: DashMap::new(),
            max_capacity: builder.max_capacity,
            default_policy: builder.policy,
        }
    }

    /// Returns the tier's default expiry policy.
    #[must_use]
    pub fn default_policy(&self) -> StorePolicy {
        self.default_policy
    }

    fn region_cache(&self, region: &str) -> Cache<String, Slot<V>> {
        if let Some(cache) = self.regions.get(region) {
            return cache.clone();
        }

        self.regions
            .entry(region.to_owned())
            .or_insert_with(|| {
                let mut builder = Cache::builder().expire_after(PerEntryExpiry {
                    default: self.default_policy,
                });
                if let Some(capacity) = self.max_capacity {
                    builder = builder.max_capacity(capacity);
                }
                builder.build()
            })
            .clone()
    }
}

#[async_trait]
impl<V> RegionStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str, region: &str) -> Result<Option<V>> {
        let cache = self.region_cache(region);
        Ok(cache.get(key).await.map(|slot| slot.value))
    }

    async fn put(&self, key: &str, region: &str, value: V) -> Result<()> {
        let cache = self.region_cache(region);
        cache
            .insert(
                key.to_owned(),
                Slot {
                    value,
                    expiry: SlotExpiry::Default,
                },
            )
            .await;
        Ok(())
    }

    async fn remove(&self, key: &str, region: &str) -> Result<bool> {
        let cache = self.region_cache(region);
        Ok(cache.remove(key).await.is_some())
    }

    async fn expire(&self, key: &str, region: &str, expiration: Expiration) -> Result<()> {
        let cache = self.region_cache(region);
        if let Some(slot) = cache.get(key).await {
            cache
                .insert(
                    key.to_owned(),
                    Slot {
                        value: slot.value,
                        expiry: SlotExpiry::Override(expiration),
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn remove_expiration(&self, key: &str, region: &str) -> Result<()> {
        let cache = self.region_cache(region);
        if let Some(slot) = cache.get(key).await {
            if slot.expiry != SlotExpiry::Default {
                cache
                    .insert(
                        key.to_owned(),
                        Slot {
                            value: slot.value,
                            expiry: SlotExpiry::Default,
                        },
                    )
                    .await;
            }
        }
        Ok(())
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        if let Some(cache) = self.regions.get(region) {
            cache.invalidate_all();
        }
        Ok(())
    }
}
