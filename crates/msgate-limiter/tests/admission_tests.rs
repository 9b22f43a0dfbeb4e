//! End-to-end admission scenarios
//!
//! Runs both tiers together the way the HTTP layer does: the distributed
//! gate first, then the worker-local limiter.

use std::sync::Arc;
use std::time::Duration;

use msgate_cache::InMemoryCounterStore;
use msgate_core::config::ConfigBuilder;
use msgate_core::domain::TenantId;
use msgate_core::ports::ICounterStore;
use msgate_core::tenant::StaticTenantResolver;
use msgate_limiter::{ConcurrencyLimiterRegistry, DistributedAdmissionGate, GateError};

// ============================================================================
// Test helpers
// ============================================================================

fn tenant(name: &str) -> TenantId {
    TenantId::new(name).unwrap()
}

fn gate_with(
    store: Arc<InMemoryCounterStore>,
    configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder,
) -> DistributedAdmissionGate {
    let config = configure(ConfigBuilder::new()).build();
    DistributedAdmissionGate::new(
        store,
        Arc::new(StaticTenantResolver::from_config(&config)),
        config.limits.counter_namespace.clone(),
    )
}

// ============================================================================
// Distributed gate
// ============================================================================

#[tokio::test]
async fn acme_ceiling_of_one() {
    let store = Arc::new(InMemoryCounterStore::new());
    let gate = gate_with(Arc::clone(&store), |b| b.tenant_concurrency_limit("acme", 1));
    let acme = tenant("acme");

    let first = gate.admit(&acme).await.unwrap();

    let second = gate.admit(&acme).await.unwrap_err();
    assert!(matches!(
        second,
        GateError::AdmissionRejected { ref tenant, ceiling: 1 } if tenant == "acme"
    ));

    first.release().await.unwrap();
    let third = gate.admit(&acme).await.unwrap();
    assert_eq!(store.read("concurrency:acme").await.unwrap(), 1);
    third.release().await.unwrap();
    assert_eq!(store.read("concurrency:acme").await.unwrap(), 0);
}

#[tokio::test]
async fn tenants_have_separate_ceilings() {
    let store = Arc::new(InMemoryCounterStore::new());
    let gate = gate_with(store, |b| {
        b.concurrency_limit(2).tenant_concurrency_limit("acme", 1)
    });

    let _acme = gate.admit(&tenant("acme")).await.unwrap();
    assert!(gate.admit(&tenant("acme")).await.is_err());

    let _g1 = gate.admit(&tenant("globex")).await.unwrap();
    let _g2 = gate.admit(&tenant("globex")).await.unwrap();
    assert!(gate.admit(&tenant("globex")).await.unwrap_err().is_rejection());
}

#[tokio::test]
async fn ceiling_counts_requests_from_other_workers() {
    let store = Arc::new(InMemoryCounterStore::new());
    let gate = gate_with(Arc::clone(&store), |b| b.concurrency_limit(3));

    // Another worker process already holds three slots
    store.set("concurrency:acme", 3);
    assert!(!gate.try_admit(&tenant("acme")).await.unwrap());
    assert!(gate.admit(&tenant("acme")).await.unwrap_err().is_rejection());

    store.decrement("concurrency:acme").await.unwrap();
    assert!(gate.try_admit(&tenant("acme")).await.unwrap());
}

#[tokio::test]
async fn track_then_release_pairing() {
    let store = Arc::new(InMemoryCounterStore::new());
    let gate = gate_with(store, |b| b.concurrency_limit(2));
    let acme = tenant("acme");

    for _ in 0..2 {
        assert!(gate.try_admit(&acme).await.unwrap());
        gate.track(&acme).await.unwrap();
    }
    assert!(!gate.try_admit(&acme).await.unwrap());

    gate.release(&acme).await.unwrap();
    assert!(gate.try_admit(&acme).await.unwrap());
}

#[tokio::test]
async fn config_changes_apply_on_next_request() {
    let store = Arc::new(InMemoryCounterStore::new());
    let config = ConfigBuilder::new().concurrency_limit(1).build();
    let resolver = Arc::new(StaticTenantResolver::from_config(&config));
    let gate = DistributedAdmissionGate::new(store, resolver.clone(), "concurrency");
    let acme = tenant("acme");

    let _held = gate.admit(&acme).await.unwrap();
    assert!(gate.admit(&acme).await.is_err());

    let relaxed = ConfigBuilder::new()
        .tenant_concurrency_limit("acme", -1)
        .build();
    resolver.replace_overrides(relaxed.tenants);

    assert!(gate.admit(&acme).await.is_ok());
}

// ============================================================================
// Both tiers
// ============================================================================

#[tokio::test]
async fn local_limiter_queues_what_the_gate_admits() {
    let store = Arc::new(InMemoryCounterStore::new());
    let gate = gate_with(Arc::clone(&store), |b| b.concurrency_limit(5));
    let registry = ConcurrencyLimiterRegistry::new(1);

    let mut workers = Vec::new();
    for _ in 0..3 {
        let gate = gate.clone();
        let registry = registry.clone();
        workers.push(tokio::spawn(async move {
            let acme = TenantId::new("acme").unwrap();
            let guard = gate.admit(&acme).await.unwrap();
            let permit = registry.acquire(acme.as_str()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            permit.release().unwrap();
            guard.release().await.unwrap();
        }));
    }

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(registry.active_count("acme") <= 1);

    for worker in workers {
        worker.await.unwrap();
    }
    assert!(registry.is_empty());
    assert_eq!(store.read("concurrency:acme").await.unwrap(), 0);
}

#[tokio::test]
async fn registry_walkthrough_with_limit_two() {
    let registry = ConcurrencyLimiterRegistry::new(2);

    let d1 = registry.start("k");
    let d2 = registry.start("k");
    let mut d3 = registry.start("k");
    let mut d4 = registry.start("k");

    d1.await.unwrap();
    d2.await.unwrap();
    assert!(!d3.is_granted());
    assert!(!d4.is_granted());

    registry.stop("k").unwrap();
    assert!(d3.is_granted());
    assert!(!d4.is_granted());

    registry.stop("k").unwrap();
    assert!(d4.is_granted());

    registry.stop("k").unwrap();
    registry.stop("k").unwrap();
    assert!(!registry.contains_key("k"));
    assert!(registry.stop("k").is_err());
}
