//! Integration tests for the ICounterStore adapters
//!
//! Every contract check runs against both the SQLite store and the
//! in-memory store, so the two stay interchangeable.

use std::sync::Arc;

use msgate_cache::{DatabasePool, InMemoryCounterStore, SqliteCounterStore};
use msgate_core::ports::ICounterStore;

// ============================================================================
// Test helpers
// ============================================================================

async fn sqlite_store() -> Arc<dyn ICounterStore> {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteCounterStore::new(pool.pool().clone()))
}

fn memory_store() -> Arc<dyn ICounterStore> {
    Arc::new(InMemoryCounterStore::new())
}

async fn all_stores() -> Vec<(&'static str, Arc<dyn ICounterStore>)> {
    vec![("sqlite", sqlite_store().await), ("memory", memory_store())]
}

// ============================================================================
// Contract
// ============================================================================

#[tokio::test]
async fn unknown_key_reads_zero() {
    for (name, store) in all_stores().await {
        assert_eq!(store.read("concurrency:nobody").await.unwrap(), 0, "{name}");
    }
}

#[tokio::test]
async fn increment_and_decrement_return_new_value() {
    for (name, store) in all_stores().await {
        assert_eq!(store.increment("k").await.unwrap(), 1, "{name}");
        assert_eq!(store.increment("k").await.unwrap(), 2, "{name}");
        assert_eq!(store.decrement("k").await.unwrap(), 1, "{name}");
        assert_eq!(store.read("k").await.unwrap(), 1, "{name}");
    }
}

#[tokio::test]
async fn decrement_never_goes_below_zero() {
    for (name, store) in all_stores().await {
        assert_eq!(store.decrement("k").await.unwrap(), 0, "{name}");
        store.increment("k").await.unwrap();
        store.decrement("k").await.unwrap();
        assert_eq!(store.decrement("k").await.unwrap(), 0, "{name}");
        assert_eq!(store.read("k").await.unwrap(), 0, "{name}");
    }
}

#[tokio::test]
async fn keys_are_independent() {
    for (name, store) in all_stores().await {
        store.increment("concurrency:a").await.unwrap();
        store.increment("concurrency:a").await.unwrap();
        store.increment("concurrency:b").await.unwrap();

        assert_eq!(store.read("concurrency:a").await.unwrap(), 2, "{name}");
        assert_eq!(store.read("concurrency:b").await.unwrap(), 1, "{name}");
    }
}

#[tokio::test]
async fn increment_below_stops_at_ceiling() {
    for (name, store) in all_stores().await {
        assert_eq!(store.increment_below("k", 2).await.unwrap(), Some(1), "{name}");
        assert_eq!(store.increment_below("k", 2).await.unwrap(), Some(2), "{name}");
        assert_eq!(store.increment_below("k", 2).await.unwrap(), None, "{name}");
        assert_eq!(store.read("k").await.unwrap(), 2, "{name}");

        store.decrement("k").await.unwrap();
        assert_eq!(store.increment_below("k", 2).await.unwrap(), Some(2), "{name}");
    }
}

#[tokio::test]
async fn increment_below_zero_ceiling_never_counts() {
    for (name, store) in all_stores().await {
        assert_eq!(store.increment_below("k", 0).await.unwrap(), None, "{name}");
        assert_eq!(store.read("k").await.unwrap(), 0, "{name}");
    }
}

#[tokio::test]
async fn concurrent_conditional_increments_respect_ceiling() {
    for (name, store) in all_stores().await {
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment_below("busy", 5).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5, "{name}");
        assert_eq!(store.read("busy").await.unwrap(), 5, "{name}");
    }
}

// ============================================================================
// Shared file
// ============================================================================

#[tokio::test]
async fn two_pools_on_one_file_share_counters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counters.db");

    let worker_a = SqliteCounterStore::new(DatabasePool::new(&path).await.unwrap().pool().clone());
    let worker_b = SqliteCounterStore::new(DatabasePool::new(&path).await.unwrap().pool().clone());

    worker_a.increment("concurrency:acme").await.unwrap();
    assert_eq!(worker_b.read("concurrency:acme").await.unwrap(), 1);
    assert_eq!(worker_b.increment_below("concurrency:acme", 1).await.unwrap(), None);

    worker_a.decrement("concurrency:acme").await.unwrap();
    assert_eq!(
        worker_b.increment_below("concurrency:acme", 1).await.unwrap(),
        Some(1)
    );
}
