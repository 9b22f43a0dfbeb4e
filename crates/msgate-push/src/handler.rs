//! Push-based dispatch handler
//!
//! [`PushDispatchHandler`] is what the window monitor calls for each entry
//! in production. The tenant is the owner recorded on the window; its
//! callback URL comes from the tenant configuration resolver on every call,
//! so URL changes apply without a restart.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use msgate_core::domain::{FlightKey, OutboundMessage, WindowId};
use msgate_core::ports::{IDispatchHandler, ITenantConfigResolver};
use msgate_window::DeliveryWindowManager;

use crate::client::{PushClient, PushPayload};

/// Relays window entries to the owning tenant's `push_message_url`
pub struct PushDispatchHandler {
    client: PushClient,
    tenants: Arc<dyn ITenantConfigResolver>,
    windows: Arc<DeliveryWindowManager>,
}

impl PushDispatchHandler {
    /// Creates a handler resolving owners through `windows`
    pub fn new(
        client: PushClient,
        tenants: Arc<dyn ITenantConfigResolver>,
        windows: Arc<DeliveryWindowManager>,
    ) -> Self {
        Self {
            client,
            tenants,
            windows,
        }
    }
}

#[async_trait]
impl IDispatchHandler for PushDispatchHandler {
    async fn handle(
        &self,
        window_id: &WindowId,
        flight_key: &FlightKey,
        message: &OutboundMessage,
    ) -> anyhow::Result<()> {
        let Some(tenant) = self.windows.owner(window_id) else {
            warn!(window = %window_id, flight_key = %flight_key, "Window has no owner; dropping entry");
            return Ok(());
        };

        let settings = self.tenants.resolve(&tenant).await?;
        let Some(url) = settings.push_message_url else {
            warn!(
                tenant = %tenant,
                window = %window_id,
                flight_key = %flight_key,
                "No push_message_url configured; dropping entry"
            );
            return Ok(());
        };

        let payload = PushPayload::from_entry(window_id, flight_key, message);
        self.client.push(&url, &payload).await?;
        Ok(())
    }
}
