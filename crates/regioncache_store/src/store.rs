// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core traits for cache storage backends.
//!
//! [`RegionStore`] defines the interface that all cache backends must
//! implement. The trait is designed for composition: implement the storage
//! operations, then use `regioncache` to layer on versioning, two-tier
//! fallback, and resilient invalidation.

use async_trait::async_trait;

use crate::{Expiration, Result};

/// Trait for region-scoped store implementations.
///
/// Every operation addresses a `(key, region)` pair. Entries in different
/// regions never observe each other, even when they share a key.
///
/// Implementations must support a per-entry expiry override that is
/// independent of the tier's default policy: [`expire`](Self::expire)
/// installs an override for one entry, and
/// [`remove_expiration`](Self::remove_expiration) drops it so the tier
/// default governs again. Removing an entry removes its override with it.
#[async_trait]
pub trait RegionStore<V>: Send + Sync {
    /// Gets a value, returning `None` if the key is absent or expired.
    ///
    /// Stores whose effective policy for the entry is sliding refresh the
    /// entry's expiry window as part of a successful read.
    async fn get(&self, key: &str, region: &str) -> Result<Option<V>>;

    /// Inserts or replaces a value under the tier's default expiry policy.
    async fn put(&self, key: &str, region: &str, value: V) -> Result<()>;

    /// Removes a value, returning whether an entry was present.
    async fn remove(&self, key: &str, region: &str) -> Result<bool>;

    /// Installs a per-entry expiry override for an existing entry.
    ///
    /// Has no effect if the entry does not exist.
    async fn expire(&self, key: &str, region: &str, expiration: Expiration) -> Result<()>;

    /// Drops any per-entry expiry override so the tier default applies.
    ///
    /// Has no effect if the entry does not exist.
    async fn remove_expiration(&self, key: &str, region: &str) -> Result<()>;

    /// Removes every entry in the given region.
    async fn clear_region(&self, region: &str) -> Result<()>;
}

/// The value-type-free subset of store operations used for cross-process
/// invalidation.
///
/// An invalidator only ever removes or clears; it never needs to decode
/// values. Shared (network) stores implement this alongside [`RegionStore`]
/// so one connection can serve providers of any value type.
#[async_trait]
pub trait Backplane: Send + Sync {
    /// Removes a value, returning whether an entry was present.
    async fn remove(&self, key: &str, region: &str) -> Result<bool>;

    /// Removes every entry in the given region.
    async fn clear_region(&self, region: &str) -> Result<()>;
}
