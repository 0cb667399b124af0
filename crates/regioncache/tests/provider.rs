// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the typed provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use regioncache::{CacheProvider, ConnectionGuard, Invalidator, RegionStore, Versioned};
use regioncache_memory::MemoryStore;
use regioncache_store::testing::{MockRegionStore, StoreOp};

type TestResult = Result<(), regioncache::Error>;

fn memory_provider<T: Clone + Send + Sync + 'static>(region: &str) -> CacheProvider<T> {
    CacheProvider::new(
        region,
        Arc::new(MemoryStore::<T>::new()),
        Arc::new(MemoryStore::<i64>::new()),
        None,
    )
}

fn mock_provider(
    values: &MockRegionStore<String>,
    versions: &MockRegionStore<i64>,
    invalidator: Option<Arc<Invalidator>>,
) -> CacheProvider<String> {
    CacheProvider::new(
        "Test-Users",
        Arc::new(values.clone()),
        Arc::new(versions.clone()),
        invalidator,
    )
}

#[tokio::test]
async fn round_trip_in_region() -> TestResult {
    let provider = memory_provider::<String>("Test-Users");

    assert_eq!(provider.region(), "Test-Users");
    assert!(provider.get("alice").await?.is_none());

    provider.set("alice", "profile".to_owned()).await?;
    assert_eq!(provider.get("alice").await?.as_deref(), Some("profile"));
    Ok(())
}

#[tokio::test]
async fn providers_in_different_regions_are_isolated() -> TestResult {
    let store = Arc::new(MemoryStore::<i32>::new());
    let versions = Arc::new(MemoryStore::<i64>::new());
    let users = CacheProvider::new(
        "Test-Users",
        Arc::clone(&store) as Arc<dyn regioncache::RegionStore<i32>>,
        Arc::clone(&versions) as Arc<dyn regioncache::RegionStore<i64>>,
        None,
    );
    let orders = CacheProvider::new("Test-Orders", store, versions, None);

    users.set("id", 1).await?;

    assert_eq!(users.get("id").await?, Some(1));
    assert!(orders.get("id").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn read_through_fetches_at_most_once() -> TestResult {
    let provider = memory_provider::<String>("Test-Users");
    let fetches = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let fetches = Arc::clone(&fetches);
        let value = provider
            .get_or_fetch("alice", move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Some("profile".to_owned())
            })
            .await?;
        assert_eq!(value.as_deref(), Some("profile"));
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn absent_fetch_result_is_not_cached() -> TestResult {
    let provider = memory_provider::<String>("Test-Users");
    let fetches = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let fetches = Arc::clone(&fetches);
        let value = provider
            .get_or_fetch("missing", move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                None
            })
            .await?;
        assert!(value.is_none());
    }

    // Every miss fetches again; a None result leaves no entry behind.
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn versioned_round_trip() -> TestResult {
    let provider = memory_provider::<String>("Test-Users");

    assert_eq!(provider.get_versioned("doc").await?, Versioned::absent());
    assert_eq!(provider.get_version("doc").await?, 0);

    provider.set_versioned("doc", "v1 body".to_owned(), 1).await?;

    let entity = provider.get_versioned("doc").await?;
    assert_eq!(entity.value.as_deref(), Some("v1 body"));
    assert_eq!(entity.version, 1);
    assert_eq!(provider.get_version("doc").await?, 1);
    Ok(())
}

#[tokio::test]
async fn version_lives_under_the_suffixed_key() -> TestResult {
    let values = MockRegionStore::new();
    let versions = MockRegionStore::new();
    let provider = mock_provider(&values, &versions, None);

    provider.set_versioned("doc", "body".to_owned(), 4).await?;

    assert!(values.contains("doc", "Test-Users"));
    assert!(versions.contains("doc-Version", "Test-Users"));
    assert_eq!(versions.value_of("doc-Version", "Test-Users"), Some(4));
    Ok(())
}

#[tokio::test]
async fn versioned_read_through_writes_value_and_version() -> TestResult {
    let provider = memory_provider::<String>("Test-Users");

    let entity = provider
        .get_versioned_or_fetch("doc", || async { Versioned::new("body".to_owned(), 7) })
        .await?;
    assert_eq!(entity.version, 7);

    // The write-through is visible to plain reads.
    assert_eq!(provider.get("doc").await?.as_deref(), Some("body"));
    assert_eq!(provider.get_version("doc").await?, 7);
    Ok(())
}

#[tokio::test]
async fn versioned_read_through_skips_absent_fetch_results() -> TestResult {
    let provider = memory_provider::<String>("Test-Users");

    let entity = provider
        .get_versioned_or_fetch("doc", || async { Versioned::absent() })
        .await?;
    assert!(!entity.is_present());
    assert!(provider.get("doc").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn set_drops_the_expiry_override_before_writing() -> TestResult {
    let values = MockRegionStore::new();
    let versions = MockRegionStore::new();
    let provider = mock_provider(&values, &versions, None);

    provider.set("alice", "profile".to_owned()).await?;

    assert_eq!(
        values.operations(),
        vec![
            StoreOp::RemoveExpiration {
                key: "alice".into(),
                region: "Test-Users".into(),
            },
            StoreOp::Put {
                key: "alice".into(),
                region: "Test-Users".into(),
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn remove_versioned_drops_overrides_before_each_removal() -> TestResult {
    let values = MockRegionStore::new();
    let versions = MockRegionStore::new();
    let provider = mock_provider(&values, &versions, None);

    provider.set_versioned("doc", "body".to_owned(), 1).await?;
    values.clear_operations();
    versions.clear_operations();

    provider.remove_versioned("doc").await?;

    assert_eq!(
        values.operations(),
        vec![
            StoreOp::RemoveExpiration {
                key: "doc".into(),
                region: "Test-Users".into(),
            },
            StoreOp::Remove {
                key: "doc".into(),
                region: "Test-Users".into(),
            },
        ]
    );
    assert_eq!(
        versions.operations(),
        vec![
            StoreOp::RemoveExpiration {
                key: "doc-Version".into(),
                region: "Test-Users".into(),
            },
            StoreOp::Remove {
                key: "doc-Version".into(),
                region: "Test-Users".into(),
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn remove_is_the_and_of_all_steps() -> TestResult {
    let values = MockRegionStore::new();
    let versions = MockRegionStore::new();
    let provider = mock_provider(&values, &versions, None);

    provider.set_versioned("doc", "body".to_owned(), 1).await?;
    assert!(provider.remove_versioned("doc").await?);

    // Nothing left to remove, so every step reports false.
    assert!(!provider.remove_versioned("doc").await?);
    Ok(())
}

#[tokio::test]
async fn remove_mirrors_through_the_invalidator() -> TestResult {
    let values = MockRegionStore::new();
    let versions = MockRegionStore::new();
    let backplane = MockRegionStore::<String>::new();
    backplane.put("alice", "Test-Users", "stale".to_owned()).await?;

    let guard = Arc::new(ConnectionGuard::new());
    let invalidator = Invalidator::shared("Test", "Users", Arc::new(backplane.clone()), guard);
    let provider = mock_provider(&values, &versions, Some(invalidator));

    provider.set("alice", "profile".to_owned()).await?;
    assert!(provider.remove("alice").await?);

    assert_eq!(backplane.removal_count("alice", "Test-Users"), 1);
    assert!(!backplane.contains("alice", "Test-Users"));
    Ok(())
}

#[tokio::test]
async fn store_errors_propagate() -> TestResult {
    let values = MockRegionStore::new();
    let versions = MockRegionStore::new();
    values.fail_when(|op| matches!(op, StoreOp::Get { .. }));
    let provider = mock_provider(&values, &versions, None);

    assert!(provider.get("alice").await.is_err());
    assert!(provider.get_versioned("alice").await.is_err());
    Ok(())
}

#[tokio::test]
async fn clear_without_invalidator_is_a_no_op() -> TestResult {
    let provider = memory_provider::<String>("Test-Users");

    provider.set("alice", "profile".to_owned()).await?;
    provider.clear().await?;

    // The local tier is untouched; clear only addresses the backplane.
    assert_eq!(provider.get("alice").await?.as_deref(), Some("profile"));
    Ok(())
}
