//! Shared counter store port (driven/secondary port)
//!
//! The distributed admission gate keeps one counter per tenant in a store
//! shared by every worker process. Worker processes cannot coordinate
//! through in-process locks, so every mutation must be a single atomic
//! operation on the store.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Counters never go below zero; a decrement on a zero or missing counter
//!   leaves it at zero.
//! - Keys are built with [`counter_key`] so all adapters share one layout.

use crate::domain::TenantId;

/// Builds the store key for a tenant's admission counter
///
/// The layout is `"<namespace>:<tenant_id>"`, e.g. `"concurrency:acme"`.
pub fn counter_key(namespace: &str, tenant: &TenantId) -> String {
    format!("{}:{}", namespace, tenant.as_str())
}

/// Port trait for atomic shared counters
///
/// ## Implementation Notes
///
/// - `increment` and `decrement` return the value after the operation.
/// - `read` returns 0 for unknown keys.
/// - `increment_below` increments only if the current value is strictly
///   below `ceiling`, returning the new value, or `None` when the counter was
///   already at or above the ceiling. It must be atomic with respect to the
///   other operations.
#[async_trait::async_trait]
pub trait ICounterStore: Send + Sync {
    /// Atomically increments the counter and returns the new value
    async fn increment(&self, key: &str) -> anyhow::Result<i64>;

    /// Atomically decrements the counter (not below zero) and returns the new value
    async fn decrement(&self, key: &str) -> anyhow::Result<i64>;

    /// Reads the current counter value
    async fn read(&self, key: &str) -> anyhow::Result<i64>;

    /// Atomically increments the counter if it is below `ceiling`
    async fn increment_below(&self, key: &str, ceiling: i64) -> anyhow::Result<Option<i64>>;
}
