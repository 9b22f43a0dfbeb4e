//! Configuration-backed tenant resolver
//!
//! [`StaticTenantResolver`] answers [`ITenantConfigResolver`] lookups from the
//! `limits` and `tenants` sections of the loaded [`Config`]. The tenant table
//! sits behind an `RwLock` so it can be swapped at runtime (e.g. on reload)
//! without restarting the gateway.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use crate::config::{Config, TenantOverride};
use crate::domain::TenantId;
use crate::ports::{ITenantConfigResolver, TenantSettings};

/// Resolves tenant settings from an in-memory copy of the configuration
#[derive(Debug)]
pub struct StaticTenantResolver {
    default_limit: i64,
    overrides: RwLock<BTreeMap<String, TenantOverride>>,
}

impl StaticTenantResolver {
    /// Creates a resolver with a global default ceiling and per-tenant overrides
    pub fn new(default_limit: i64, overrides: BTreeMap<String, TenantOverride>) -> Self {
        Self {
            default_limit,
            overrides: RwLock::new(overrides),
        }
    }

    /// Creates a resolver from the `limits` and `tenants` configuration sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.limits.concurrency_limit, config.tenants.clone())
    }

    /// Replaces the per-tenant overrides
    pub fn replace_overrides(&self, overrides: BTreeMap<String, TenantOverride>) {
        match self.overrides.write() {
            Ok(mut guard) => *guard = overrides,
            Err(poisoned) => *poisoned.into_inner() = overrides,
        }
    }

    fn settings_for(&self, tenant: &TenantId) -> anyhow::Result<TenantSettings> {
        let overrides = self
            .overrides
            .read()
            .map_err(|_| anyhow::anyhow!("tenant override table lock poisoned"))?;
        let entry = overrides.get(tenant.as_str());

        Ok(TenantSettings {
            concurrency_limit: entry
                .and_then(|o| o.concurrency_limit)
                .unwrap_or(self.default_limit),
            push_message_url: entry.and_then(|o| o.push_message_url.clone()),
        })
    }
}

#[async_trait::async_trait]
impl ITenantConfigResolver for StaticTenantResolver {
    async fn resolve(&self, tenant: &TenantId) -> anyhow::Result<TenantSettings> {
        let settings = self.settings_for(tenant)?;
        debug!(
            tenant = %tenant,
            concurrency_limit = settings.concurrency_limit,
            "Resolved tenant settings"
        );
        Ok(settings)
    }
}
