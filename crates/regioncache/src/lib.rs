// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A typed, region-scoped, two-tier caching façade.
//!
//! `regioncache` puts a [`CacheProvider`] in front of one or two storage
//! tiers: an in-process tier ([`regioncache_memory`]) and a shared Redis
//! tier ([`regioncache_redis`]). Every provider owns a *region*, a
//! namespace derived from the environment name plus either an explicit
//! region name or the cached value's type, so different environments and
//! value types never collide inside one physical store.
//!
//! Providers support plain and versioned entries (the version rides along
//! under a second key), cache-aside read-through, and per-entry expiry
//! overrides. Cross-process invalidation goes through an [`Invalidator`]
//! that keeps working while the shared connection is down: removals and
//! clears are buffered and replayed when the connection returns.
//!
//! The [`CacheFactory`] hands out providers by identity: ask twice for the
//! same value type, region, and settings and you get the same instance.
//!
//! # Examples
//!
//! ```
//! use regioncache::{CacheFactory, CacheModule};
//!
//! # async fn demo() -> Result<(), regioncache::Error> {
//! let factory = CacheFactory::new();
//! factory.setup(CacheModule::new("Prod"));
//!
//! let users = factory.provider_in::<String>("Users").await?;
//! users.set("alice", "profile".to_owned()).await?;
//! assert_eq!(users.get("alice").await?.as_deref(), Some("profile"));
//! # Ok(())
//! # }
//! ```

mod config;
mod factory;
mod invalidator;
mod layered;
mod provider;

#[doc(inline)]
pub use config::{CacheModule, ConfigRegistry, InvalidatorConfig, LocalPolicy, RedisPolicy};
#[doc(inline)]
pub use factory::CacheFactory;
#[doc(inline)]
pub use invalidator::Invalidator;
#[doc(inline)]
pub use layered::LayeredStore;
#[doc(inline)]
pub use provider::{CacheProvider, Versioned};

pub use regioncache_store::{
    Backplane, ConnectionGuard, Error, Expiration, ExpiryType, RegionStore, Result, StorePolicy,
};

/// Suffix of the key a versioned entry's version is stored under.
pub(crate) const VERSION_SUFFIX: &str = "-Version";

pub(crate) fn version_key(key: &str) -> String {
    format!("{key}{VERSION_SUFFIX}")
}
