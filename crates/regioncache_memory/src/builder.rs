// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;

use regioncache_store::StorePolicy;

use crate::MemoryStore;

/// Builder for configuring a [`MemoryStore`].
///
/// # Examples
///
/// ```
/// use regioncache_memory::MemoryStore;
/// use regioncache_store::StorePolicy;
/// use std::time::Duration;
///
/// let store = MemoryStore::<i32>::builder()
///     .max_capacity(10_000)
///     .policy(StorePolicy::sliding(Duration::from_secs(300)))
///     .build();
/// ```
#[derive(Debug)]
pub struct MemoryStoreBuilder<V> {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) policy: StorePolicy,
    _value: PhantomData<fn() -> V>,
}

impl<V> Default for MemoryStoreBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStoreBuilder<V> {
    /// Creates a builder with no capacity bound and no default expiry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_capacity: None,
            policy: StorePolicy::none(),
            _value: PhantomData,
        }
    }

    /// Sets the maximum number of entries kept per region.
    ///
    /// Once the capacity is reached, entries are evicted using moka's
    /// `TinyLFU` policy.
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    /// Sets the tier's default expiry policy.
    ///
    /// Individual entries can still override it through
    /// [`RegionStore::expire`](regioncache_store::RegionStore::expire).
    #[must_use]
    pub fn policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the store.
    #[must_use]
    pub fn build(self) -> MemoryStore<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        MemoryStore::from_builder(&self)
    }
}
