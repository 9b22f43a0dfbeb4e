//! Tenant configuration port (driven/secondary port)
//!
//! Tenant settings are resolved on every request rather than cached at
//! startup, so operators can change a tenant's ceiling while the gateway is
//! running. Resolution may need I/O, hence the async trait.

use serde::{Deserialize, Serialize};

use crate::domain::TenantId;

/// Live settings for a single tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Maximum concurrent requests across all workers; `< 0` disables the check
    pub concurrency_limit: i64,
    /// Callback URL outbound messages are relayed to
    pub push_message_url: Option<String>,
}

/// Port trait resolving a tenant's live settings
#[async_trait::async_trait]
pub trait ITenantConfigResolver: Send + Sync {
    /// Resolves the current settings for `tenant`
    ///
    /// Errors must be propagated: callers treat a failed resolution as a
    /// reason to refuse admission.
    async fn resolve(&self, tenant: &TenantId) -> anyhow::Result<TenantSettings>;
}
