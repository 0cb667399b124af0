// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the moka-backed region store.

use std::time::{Duration, SystemTime};

use regioncache_memory::MemoryStore;
use regioncache_store::{Error, Expiration, RegionStore, StorePolicy};

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

#[test]
fn put_get_round_trip() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::new();

        assert!(store.get("key", "region").await?.is_none());

        store.put("key", "region", 42).await?;
        assert_eq!(store.get("key", "region").await?, Some(42));
        Ok(())
    })
}

#[test]
fn regions_are_isolated() -> TestResult {
    block_on(async {
        let store = MemoryStore::<String>::new();

        store.put("key", "a", "in-a".to_owned()).await?;

        assert_eq!(store.get("key", "a").await?.as_deref(), Some("in-a"));
        assert!(store.get("key", "b").await?.is_none());
        Ok(())
    })
}

#[test]
fn remove_reports_presence() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::new();

        store.put("key", "region", 1).await?;

        assert!(store.remove("key", "region").await?);
        assert!(!store.remove("key", "region").await?);
        assert!(store.get("key", "region").await?.is_none());
        Ok(())
    })
}

#[test]
fn clear_region_leaves_other_regions_alone() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::new();

        store.put("k1", "a", 1).await?;
        store.put("k2", "a", 2).await?;
        store.put("k1", "b", 3).await?;

        store.clear_region("a").await?;

        assert!(store.get("k1", "a").await?.is_none());
        assert!(store.get("k2", "a").await?.is_none());
        assert_eq!(store.get("k1", "b").await?, Some(3));
        Ok(())
    })
}

#[test]
fn absolute_override_in_the_past_expires_entry() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::new();

        store.put("key", "region", 42).await?;
        store
            .expire(
                "key",
                "region",
                Expiration::Absolute(SystemTime::now() - Duration::from_secs(1)),
            )
            .await?;

        assert!(store.get("key", "region").await?.is_none());
        Ok(())
    })
}

#[test]
fn sliding_tier_default_expires_idle_entries() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::with_policy(StorePolicy::sliding(Duration::from_millis(100)));

        store.put("key", "region", 42).await?;
        std::thread::sleep(Duration::from_millis(400));

        assert!(store.get("key", "region").await?.is_none());
        Ok(())
    })
}

#[test]
fn absolute_tier_default_expires_entries_after_write() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::with_policy(StorePolicy::absolute(Duration::from_millis(100)));

        store.put("key", "region", 42).await?;
        assert_eq!(store.get("key", "region").await?, Some(42));

        // Reads do not extend an absolute lifetime.
        std::thread::sleep(Duration::from_millis(400));
        assert!(store.get("key", "region").await?.is_none());
        Ok(())
    })
}

#[test]
fn none_override_outlives_expiring_tier_default() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::with_policy(StorePolicy::sliding(Duration::from_millis(100)));

        store.put("key", "region", 42).await?;
        store.expire("key", "region", Expiration::None).await?;
        std::thread::sleep(Duration::from_millis(400));

        assert_eq!(store.get("key", "region").await?, Some(42));
        Ok(())
    })
}

#[test]
fn expire_on_missing_key_is_a_no_op() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::new();

        store
            .expire("missing", "region", Expiration::Sliding(Duration::from_secs(1)))
            .await?;
        store.remove_expiration("missing", "region").await?;

        assert!(store.get("missing", "region").await?.is_none());
        Ok(())
    })
}

#[test]
fn remove_expiration_restores_tier_default() -> TestResult {
    block_on(async {
        let store = MemoryStore::<i32>::new();

        store.put("key", "region", 42).await?;
        store
            .expire(
                "key",
                "region",
                Expiration::Absolute(SystemTime::now() + Duration::from_secs(3600)),
            )
            .await?;
        store.remove_expiration("key", "region").await?;

        // Tier default is no expiry, so the entry survives.
        assert_eq!(store.get("key", "region").await?, Some(42));
        Ok(())
    })
}
