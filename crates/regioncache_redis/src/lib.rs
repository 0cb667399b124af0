// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Redis-backed shared store tier for regioncache.
//!
//! [`RedisStore`] implements the
//! [`RegionStore`](regioncache_store::RegionStore) contract (for any
//! serde-serializable value type) and the
//! [`Backplane`](regioncache_store::Backplane) contract over one
//! multiplexed [`redis::aio::ConnectionManager`]. A [`ConnectionMonitor`]
//! task translates the health of that connection into edge-triggered
//! notifications on a shared
//! [`ConnectionGuard`](regioncache_store::ConnectionGuard).
//!
//! The wire layout is intentionally simple: an entry for key `k` in region
//! `r` lives under the Redis key `"r:k"`, holding a JSON envelope of the
//! value plus its sliding window (if any) so reads can refresh the window.

mod monitor;
mod store;

#[doc(inline)]
pub use monitor::{ConnectionMonitor, DEFAULT_PROBE_INTERVAL};
#[doc(inline)]
pub use store::{RedisStore, connect};

pub use redis::aio::ConnectionManager;
