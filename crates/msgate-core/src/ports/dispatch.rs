//! Dispatch handler port
//!
//! The delivery window monitor hands every entry it moves into flight to an
//! [`IDispatchHandler`]. Handlers usually perform network I/O and may fail;
//! a failure is logged by the monitor and the entry's flight slot is left to
//! expire.

use crate::domain::{FlightKey, OutboundMessage, WindowId};

/// Port trait delivering one in-flight window entry
#[async_trait::async_trait]
pub trait IDispatchHandler: Send + Sync {
    /// Delivers `message`, stored under `flight_key` in window `window_id`
    ///
    /// Returning `Ok` acknowledges the entry and frees its flight slot.
    async fn handle(
        &self,
        window_id: &WindowId,
        flight_key: &FlightKey,
        message: &OutboundMessage,
    ) -> anyhow::Result<()>;
}
