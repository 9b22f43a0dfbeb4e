//! Window pacing loop
//!
//! [`WindowMonitor`] wakes every `monitor_interval` and, for each window:
//!
//! 1. drops flights older than the TTL,
//! 2. moves pending entries into flight while slots are free, spawning one
//!    dispatch task per entry,
//! 3. optionally removes the window once it was idle on two passes in a
//!    row, so a settled window's counters stay readable for one interval.
//!
//! A dispatch task calls the [`IDispatchHandler`] and acknowledges the entry
//! when the handler returns `Ok`. A handler error is logged and the entry is
//! left in flight until it expires.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use msgate_core::config::WindowConfig;
use msgate_core::domain::{FlightKey, WindowId};
use msgate_core::ports::IDispatchHandler;

use crate::manager::DeliveryWindowManager;
use crate::WindowError;

/// Periodic driver that drains delivery windows into a dispatch handler
pub struct WindowMonitor {
    manager: Arc<DeliveryWindowManager>,
    handler: Arc<dyn IDispatchHandler>,
    interval: Duration,
    cleanup: bool,
}

impl WindowMonitor {
    /// Creates a monitor; nothing runs until [`run`](Self::run) or [`tick`](Self::tick)
    pub fn new(
        manager: Arc<DeliveryWindowManager>,
        handler: Arc<dyn IDispatchHandler>,
        interval: Duration,
        cleanup: bool,
    ) -> Self {
        Self {
            manager,
            handler,
            interval,
            cleanup,
        }
    }

    /// Creates a monitor from the `window` configuration section
    pub fn from_config(
        manager: Arc<DeliveryWindowManager>,
        handler: Arc<dyn IDispatchHandler>,
        config: &WindowConfig,
    ) -> Self {
        Self::new(manager, handler, config.monitor_interval(), config.cleanup)
    }

    /// Runs one pacing pass over every window
    ///
    /// Returns the number of entries handed to the dispatch handler.
    pub fn tick(&self) -> usize {
        let mut dispatched = 0;
        for window_id in self.manager.window_ids() {
            match self.process_window(&window_id) {
                Ok(n) => dispatched += n,
                // Removed between listing and processing
                Err(WindowError::NotFound(_)) => continue,
                Err(e) => {
                    error!(window = %window_id, error = %e, "Failed to process window");
                    continue;
                }
            }

            if self.cleanup && self.manager.remove_if_idle(&window_id) {
                info!(window = %window_id, "Removed idle delivery window");
            }
        }
        dispatched
    }

    fn process_window(&self, window_id: &WindowId) -> Result<usize, WindowError> {
        for key in self.manager.clear_expired(window_id)? {
            warn!(window = %window_id, flight_key = %key, "Flight expired without acknowledgment");
        }

        let mut dispatched = 0;
        while let Some(key) = self.manager.next_ready(window_id)? {
            self.dispatch(window_id.clone(), key);
            dispatched += 1;
        }
        if dispatched > 0 {
            debug!(window = %window_id, dispatched, "Dispatched window entries");
        }
        Ok(dispatched)
    }

    fn dispatch(&self, window_id: WindowId, key: FlightKey) {
        let manager = Arc::clone(&self.manager);
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            let message = match manager.get_data(&window_id, &key) {
                Ok(message) => message,
                Err(e) => {
                    debug!(window = %window_id, flight_key = %key, error = %e, "Entry gone before dispatch");
                    return;
                }
            };

            if let Err(e) = handler.handle(&window_id, &key, &message).await {
                error!(
                    window = %window_id,
                    flight_key = %key,
                    error = %e,
                    "Dispatch failed; entry stays in flight until it expires"
                );
                return;
            }

            match manager.acknowledge(&window_id, &key) {
                Ok(()) => debug!(window = %window_id, flight_key = %key, "Entry delivered"),
                Err(e) => debug!(
                    window = %window_id,
                    flight_key = %key,
                    error = %e,
                    "Acknowledged after expiry"
                ),
            }
        });
    }

    /// Runs the pacing loop until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            cleanup = self.cleanup,
            "Window monitor starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        info!("Window monitor stopped");
    }
}
