// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! This module provides [`MockRegionStore`], a configurable in-memory store
//! that records all operations and supports failure injection for testing
//! error paths.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Backplane, Error, Expiration, RegionStore, Result};

/// Recorded store operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A get operation was performed.
    Get {
        /// The key that was read.
        key: String,
        /// The region that was addressed.
        region: String,
    },
    /// A put operation was performed.
    Put {
        /// The key that was written.
        key: String,
        /// The region that was addressed.
        region: String,
    },
    /// A remove operation was performed.
    Remove {
        /// The key that was removed.
        key: String,
        /// The region that was addressed.
        region: String,
    },
    /// A per-entry expiry override was installed.
    Expire {
        /// The key whose expiry was overridden.
        key: String,
        /// The region that was addressed.
        region: String,
    },
    /// A per-entry expiry override was dropped.
    RemoveExpiration {
        /// The key whose override was dropped.
        key: String,
        /// The region that was addressed.
        region: String,
    },
    /// A whole region was cleared.
    ClearRegion(
        /// The region that was cleared.
        String,
    ),
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

/// A configurable mock store for testing.
///
/// The store keeps values in memory and can be configured to fail
/// operations on demand, making it useful for testing error handling paths.
/// All operations are recorded for later verification. Expiry overrides are
/// recorded but never enforced; tests that care about expiry assert on the
/// recorded operations instead.
///
/// # Examples
///
/// ```
/// use regioncache_store::testing::{MockRegionStore, StoreOp};
/// use regioncache_store::RegionStore;
///
/// # futures::executor::block_on(async {
/// let store = MockRegionStore::<i32>::new();
///
/// store.put("key", "region", 42).await?;
/// assert_eq!(store.get("key", "region").await?, Some(42));
///
/// assert_eq!(store.operations(), vec![
///     StoreOp::Put { key: "key".into(), region: "region".into() },
///     StoreOp::Get { key: "key".into(), region: "region".into() },
/// ]);
/// # Ok::<(), regioncache_store::Error>(())
/// # });
/// ```
pub struct MockRegionStore<V> {
    data: Arc<Mutex<HashMap<(String, String), V>>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl<V> std::fmt::Debug for MockRegionStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRegionStore")
            .field("entries", &self.data.lock().len())
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<V> Clone for MockRegionStore<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<V> Default for MockRegionStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockRegionStore<V> {
    /// Creates a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should
    /// fail. Failed operations are still recorded.
    ///
    /// # Examples
    ///
    /// ```
    /// use regioncache_store::testing::{MockRegionStore, StoreOp};
    ///
    /// let store: MockRegionStore<i32> = MockRegionStore::new();
    ///
    /// // Fail all gets
    /// store.fail_when(|op| matches!(op, StoreOp::Get { .. }));
    ///
    /// // Fail removals of a specific key
    /// store.fail_when(|op| matches!(op, StoreOp::Remove { key, .. } if key == "bad"));
    /// ```
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the number of entries across all regions.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the store contains the given key in the given region.
    #[must_use]
    pub fn contains(&self, key: &str, region: &str) -> bool {
        self.data.lock().contains_key(&(region.to_owned(), key.to_owned()))
    }

    /// Returns how many removals were recorded for the given key and region.
    #[must_use]
    pub fn removal_count(&self, key: &str, region: &str) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| matches!(op, StoreOp::Remove { key: k, region: r } if k == key && r == region))
            .count()
    }

    fn record(&self, op: StoreOp) {
        self.operations.lock().push(op);
    }

    fn should_fail(&self, op: &StoreOp) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    fn run(&self, op: StoreOp) -> Result<()> {
        if self.should_fail(&op) {
            self.record(op);
            return Err(Error::from_message("mock: operation failed"));
        }
        self.record(op);
        Ok(())
    }
}

impl<V: Clone> MockRegionStore<V> {
    /// Returns the stored value for the given key and region, if any.
    #[must_use]
    pub fn value_of(&self, key: &str, region: &str) -> Option<V> {
        self.data.lock().get(&(region.to_owned(), key.to_owned())).cloned()
    }
}

#[async_trait]
impl<V> RegionStore<V> for MockRegionStore<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &str, region: &str) -> Result<Option<V>> {
        self.run(StoreOp::Get {
            key: key.to_owned(),
            region: region.to_owned(),
        })?;
        Ok(self.data.lock().get(&(region.to_owned(), key.to_owned())).cloned())
    }

    async fn put(&self, key: &str, region: &str, value: V) -> Result<()> {
        self.run(StoreOp::Put {
            key: key.to_owned(),
            region: region.to_owned(),
        })?;
        self.data.lock().insert((region.to_owned(), key.to_owned()), value);
        Ok(())
    }

    async fn remove(&self, key: &str, region: &str) -> Result<bool> {
        self.run(StoreOp::Remove {
            key: key.to_owned(),
            region: region.to_owned(),
        })?;
        Ok(self.data.lock().remove(&(region.to_owned(), key.to_owned())).is_some())
    }

    async fn expire(&self, key: &str, region: &str, _expiration: Expiration) -> Result<()> {
        self.run(StoreOp::Expire {
            key: key.to_owned(),
            region: region.to_owned(),
        })
    }

    async fn remove_expiration(&self, key: &str, region: &str) -> Result<()> {
        self.run(StoreOp::RemoveExpiration {
            key: key.to_owned(),
            region: region.to_owned(),
        })
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        self.run(StoreOp::ClearRegion(region.to_owned()))?;
        self.data.lock().retain(|(r, _), _| r != region);
        Ok(())
    }
}

#[async_trait]
impl<V> Backplane for MockRegionStore<V>
where
    V: Clone + Send + Sync,
{
    async fn remove(&self, key: &str, region: &str) -> Result<bool> {
        RegionStore::remove(self, key, region).await
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        RegionStore::clear_region(self, region).await
    }
}
