// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process store tier for regioncache, backed by moka.
//!
//! [`MemoryStore`] implements the
//! [`RegionStore`](regioncache_store::RegionStore) contract with one moka
//! cache per region, giving concurrent access, automatic eviction, and
//! per-entry expiry overrides on top of the tier's default policy.

mod builder;
mod store;

#[doc(inline)]
pub use builder::MemoryStoreBuilder;
#[doc(inline)]
pub use store::MemoryStore;
