// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two-tier store composition.

use std::sync::Arc;

use async_trait::async_trait;
use regioncache_store::{Expiration, RegionStore, Result};

/// Composes a fast local tier over a shared tier.
///
/// Reads try the local tier first and fall back to the shared tier,
/// promoting shared hits into the local tier so the next read stays
/// in-process. Writes and removals go to both tiers; the local write lands
/// first so a reader racing the write never sees the shared tier ahead of
/// its own process.
///
/// There is no cross-tier atomicity: a failure between the two writes can
/// leave the tiers briefly divergent, which cross-process invalidation and
/// expiry are expected to heal.
pub struct LayeredStore<V> {
    local: Arc<dyn RegionStore<V>>,
    shared: Arc<dyn RegionStore<V>>,
}

impl<V> std::fmt::Debug for LayeredStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredStore").finish_non_exhaustive()
    }
}

impl<V> LayeredStore<V> {
    /// Creates a layered store from its two tiers.
    #[must_use]
    pub fn new(local: Arc<dyn RegionStore<V>>, shared: Arc<dyn RegionStore<V>>) -> Self {
        Self { local, shared }
    }
}

#[async_trait]
impl<V> RegionStore<V> for LayeredStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str, region: &str) -> Result<Option<V>> {
        if let Some(value) = self.local.get(key, region).await? {
            return Ok(Some(value));
        }

        let Some(value) = self.shared.get(key, region).await? else {
            return Ok(None);
        };

        // Promote the shared hit into the local tier.
        self.local.put(key, region, value.clone()).await?;
        Ok(Some(value))
    }

    async fn put(&self, key: &str, region: &str, value: V) -> Result<()> {
        self.local.put(key, region, value.clone()).await?;
        self.shared.put(key, region, value).await
    }

    async fn remove(&self, key: &str, region: &str) -> Result<bool> {
        let local = self.local.remove(key, region).await?;
        let shared = self.shared.remove(key, region).await?;
        Ok(local | shared)
    }

    async fn expire(&self, key: &str, region: &str, expiration: Expiration) -> Result<()> {
        self.local.expire(key, region, expiration).await?;
        self.shared.expire(key, region, expiration).await
    }

    async fn remove_expiration(&self, key: &str, region: &str) -> Result<()> {
        self.local.remove_expiration(key, region).await?;
        self.shared.remove_expiration(key, region).await
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        self.local.clear_region(region).await?;
        self.shared.clear_region(region).await
    }
}

#[cfg(test)]
mod tests {
    use regioncache_store::testing::{MockRegionStore, StoreOp};

    use super::*;

    fn layered(
        local: &MockRegionStore<i32>,
        shared: &MockRegionStore<i32>,
    ) -> LayeredStore<i32> {
        LayeredStore::new(Arc::new(local.clone()), Arc::new(shared.clone()))
    }

    #[tokio::test]
    async fn local_hit_never_touches_shared_tier() -> Result<()> {
        let local = MockRegionStore::new();
        let shared = MockRegionStore::new();
        let store = layered(&local, &shared);

        store.put("key", "region", 1).await?;
        shared.clear_operations();

        assert_eq!(store.get("key", "region").await?, Some(1));
        assert!(shared.operations().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn shared_hit_is_promoted_into_local_tier() -> Result<()> {
        let local = MockRegionStore::new();
        let shared = MockRegionStore::new();
        shared.put("key", "region", 7).await?;
        let store = layered(&local, &shared);

        assert_eq!(store.get("key", "region").await?, Some(7));
        assert_eq!(local.value_of("key", "region"), Some(7));
        Ok(())
    }

    #[tokio::test]
    async fn remove_reports_presence_in_either_tier() -> Result<()> {
        let local = MockRegionStore::new();
        let shared = MockRegionStore::new();
        shared.put("key", "region", 7).await?;
        let store = layered(&local, &shared);

        assert!(store.remove("key", "region").await?);
        assert!(!store.remove("key", "region").await?);
        Ok(())
    }

    #[tokio::test]
    async fn writes_land_in_local_tier_first() -> Result<()> {
        let local = MockRegionStore::new();
        let shared = MockRegionStore::new();
        shared.fail_when(|op| matches!(op, StoreOp::Put { .. }));
        let store = layered(&local, &shared);

        assert!(store.put("key", "region", 1).await.is_err());
        assert_eq!(local.value_of("key", "region"), Some(1));
        Ok(())
    }
}
