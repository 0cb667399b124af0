// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Core store abstractions for building regioncache backends.
//!
//! This crate defines the [`RegionStore`] trait that all cache backends must
//! satisfy, the [`Backplane`] subset used for cross-process invalidation,
//! the [`Expiration`] policy type, [`Error`] types for fallible operations,
//! and the [`ConnectionGuard`] availability signal shared by every component
//! that talks to the same network endpoint.
//!
//! # Overview
//!
//! The store abstraction separates storage concerns from caching features.
//! Implement [`RegionStore`] for your storage backend, then use `regioncache`
//! to add versioned entries, layered tiers, and resilient invalidation on
//! top. All entries are addressed by a `(key, region)` pair; a region is a
//! logical namespace that keeps entries of different environments and value
//! types apart inside one physical store.

pub mod error;
mod expiry;
mod guard;
mod store;
pub mod testing;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use expiry::{Expiration, ExpiryType, StorePolicy};
#[doc(inline)]
pub use guard::ConnectionGuard;
#[doc(inline)]
pub use store::{Backplane, RegionStore};
