//! Store-backed admission gate
//!
//! [`DistributedAdmissionGate`] enforces one per-tenant ceiling across every
//! worker process by keeping the tenant's in-flight count in a shared
//! [`ICounterStore`]. Requests over the ceiling are rejected, never queued.
//!
//! Two ways in:
//!
//! - [`admit`](DistributedAdmissionGate::admit) checks and counts in a single
//!   atomic store operation and returns an [`AdmissionGuard`] that releases
//!   the count on every exit path.
//! - [`try_admit`](DistributedAdmissionGate::try_admit) followed by
//!   [`track`](DistributedAdmissionGate::track) reads then increments. Under
//!   load several workers can pass the check together and overshoot the
//!   ceiling briefly. Callers must pair `track` with
//!   [`release`](DistributedAdmissionGate::release) themselves.
//!
//! Any store or configuration failure is returned as an error; the gate
//! never admits when it cannot tell.

use std::sync::Arc;

use msgate_core::domain::TenantId;
use msgate_core::ports::{counter_key, ICounterStore, ITenantConfigResolver};
use tracing::{debug, info, warn};

use crate::GateError;

/// Per-tenant ceiling shared by every worker through a counter store
#[derive(Clone)]
pub struct DistributedAdmissionGate {
    store: Arc<dyn ICounterStore>,
    tenants: Arc<dyn ITenantConfigResolver>,
    namespace: Arc<str>,
}

impl DistributedAdmissionGate {
    /// Creates a gate keeping its counters under `namespace`
    pub fn new(
        store: Arc<dyn ICounterStore>,
        tenants: Arc<dyn ITenantConfigResolver>,
        namespace: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            tenants,
            namespace: namespace.into(),
        }
    }

    /// Counter store key for `tenant`
    pub fn key(&self, tenant: &TenantId) -> String {
        counter_key(&self.namespace, tenant)
    }

    /// Current ceiling for `tenant`; negative means unlimited
    pub async fn ceiling(&self, tenant: &TenantId) -> Result<i64, GateError> {
        self.tenants
            .resolve(tenant)
            .await
            .map(|settings| settings.concurrency_limit)
            .map_err(|e| GateError::Config(format!("{e:#}")))
    }

    /// Checks whether `tenant` is below its ceiling, without counting
    pub async fn try_admit(&self, tenant: &TenantId) -> Result<bool, GateError> {
        let ceiling = self.ceiling(tenant).await?;
        if ceiling < 0 {
            return Ok(true);
        }
        let count = self.in_flight(tenant).await?;
        let allowed = count < ceiling;
        debug!(tenant = %tenant, count, ceiling, allowed, "Checked admission");
        Ok(allowed)
    }

    /// Counts one request in flight for `tenant`
    pub async fn track(&self, tenant: &TenantId) -> Result<i64, GateError> {
        let key = self.key(tenant);
        self.store.increment(&key).await.map_err(store_error)
    }

    /// Counts one request for `tenant` as finished
    pub async fn release(&self, tenant: &TenantId) -> Result<i64, GateError> {
        let key = self.key(tenant);
        self.store.decrement(&key).await.map_err(store_error)
    }

    /// Requests currently counted in flight for `tenant`
    pub async fn in_flight(&self, tenant: &TenantId) -> Result<i64, GateError> {
        let key = self.key(tenant);
        self.store.read(&key).await.map_err(store_error)
    }

    /// Atomically checks the ceiling and counts the request
    ///
    /// # Errors
    ///
    /// [`GateError::AdmissionRejected`] when the tenant is at its ceiling,
    /// or a store/config error when the decision could not be made.
    pub async fn admit(&self, tenant: &TenantId) -> Result<AdmissionGuard, GateError> {
        let ceiling = self.ceiling(tenant).await?;
        let key = self.key(tenant);

        let count = if ceiling < 0 {
            self.store.increment(&key).await.map_err(store_error)?
        } else {
            match self
                .store
                .increment_below(&key, ceiling)
                .await
                .map_err(store_error)?
            {
                Some(count) => count,
                None => {
                    info!(tenant = %tenant, ceiling, "Admission rejected");
                    return Err(GateError::AdmissionRejected {
                        tenant: tenant.to_string(),
                        ceiling,
                    });
                }
            }
        };

        debug!(tenant = %tenant, count, ceiling, "Admitted request");
        Ok(AdmissionGuard {
            gate: self.clone(),
            tenant: tenant.clone(),
            released: false,
        })
    }
}

impl std::fmt::Debug for DistributedAdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedAdmissionGate")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

fn store_error(e: anyhow::Error) -> GateError {
    GateError::Store(format!("{e:#}"))
}

// ============================================================================
// AdmissionGuard
// ============================================================================

/// One admitted request; the tenant's counter is decremented when it ends
///
/// Call [`release`](Self::release) on the normal path. If the guard is
/// dropped instead (early return, panic, cancelled request future) the
/// decrement is spawned onto the current tokio runtime.
#[derive(Debug)]
pub struct AdmissionGuard {
    gate: DistributedAdmissionGate,
    tenant: TenantId,
    released: bool,
}

impl AdmissionGuard {
    /// Tenant this admission was granted to
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Releases the admission and returns the tenant's remaining count
    ///
    /// The decrement runs as its own task, so it completes even if this
    /// future is dropped while waiting on the store.
    pub async fn release(mut self) -> Result<i64, GateError> {
        self.released = true;
        let gate = self.gate.clone();
        let tenant = self.tenant.clone();
        tokio::spawn(async move { gate.release(&tenant).await })
            .await
            .map_err(|e| GateError::Store(format!("release task failed: {e}")))?
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let gate = self.gate.clone();
        let tenant = self.tenant.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = gate.release(&tenant).await {
                        warn!(tenant = %tenant, error = %e, "Failed to release admission");
                    }
                });
            }
            Err(_) => {
                warn!(tenant = %tenant, "No runtime to release admission; counter leaked");
            }
        }
    }
}
