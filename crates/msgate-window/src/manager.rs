//! Delivery window state
//!
//! [`DeliveryWindowManager`] holds every window of the process behind one
//! mutex. All methods are synchronous and short; none holds the lock across
//! an `.await`.
//!
//! ## Entry lifecycle
//!
//! ```text
//! add() ──→ pending ──next_ready()──→ in flight ──acknowledge()──→ delivered
//!                                          │
//!                                          └──clear_expired()──→ expired
//! ```
//!
//! Flight start times use `tokio::time::Instant`, so tests can drive expiry
//! with a paused clock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use msgate_core::config::WindowConfig;
use msgate_core::domain::{FlightKey, OutboundMessage, TenantId, WindowId};

use crate::WindowError;

/// Snapshot of one window's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    /// Entries waiting for a flight slot
    pub pending: usize,
    /// Entries handed to the dispatch handler and not yet settled
    pub in_flight: usize,
    /// Entries acknowledged by the dispatch handler
    pub delivered: u64,
    /// Entries whose flight timed out
    pub expired: u64,
}

#[derive(Debug, Default)]
struct Window {
    owner: Option<TenantId>,
    pending: VecDeque<FlightKey>,
    data: HashMap<FlightKey, OutboundMessage>,
    in_flight: HashMap<FlightKey, Instant>,
    delivered: u64,
    expired: u64,
    /// Idle at the last cleanup pass
    idle_seen: bool,
}

impl Window {
    fn stats(&self) -> WindowStats {
        WindowStats {
            pending: self.pending.len(),
            in_flight: self.in_flight.len(),
            delivered: self.delivered,
            expired: self.expired,
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    fn push(&mut self, message: OutboundMessage) -> FlightKey {
        let key = FlightKey::new();
        self.data.insert(key, message);
        self.pending.push_back(key);
        self.idle_seen = false;
        key
    }
}

/// All delivery windows of this process
#[derive(Debug)]
pub struct DeliveryWindowManager {
    max_in_flight: usize,
    flight_ttl: Duration,
    windows: Mutex<HashMap<WindowId, Window>>,
}

impl DeliveryWindowManager {
    /// Creates a manager with no windows
    pub fn new(max_in_flight: usize, flight_ttl: Duration) -> Self {
        Self {
            max_in_flight,
            flight_ttl,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a manager from the `window` configuration section
    pub fn from_config(config: &WindowConfig) -> Self {
        Self::new(config.max_in_flight, config.flight_ttl())
    }

    /// Maximum number of in-flight entries per window
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Time an entry may stay in flight before it expires
    pub fn flight_ttl(&self) -> Duration {
        self.flight_ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WindowId, Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_window<T>(
        &self,
        id: &WindowId,
        f: impl FnOnce(&mut Window) -> Result<T, WindowError>,
    ) -> Result<T, WindowError> {
        let mut windows = self.lock();
        let window = windows
            .get_mut(id)
            .ok_or_else(|| WindowError::NotFound(id.to_string()))?;
        f(window)
    }

    /// Creates a window
    ///
    /// With `strict == false` an existing window is left as it is.
    pub fn create_window(&self, id: &WindowId, strict: bool) -> Result<(), WindowError> {
        self.create(id, None, strict)
    }

    /// Creates a window whose deliveries belong to `owner`
    pub fn create_window_for(
        &self,
        id: &WindowId,
        owner: TenantId,
        strict: bool,
    ) -> Result<(), WindowError> {
        self.create(id, Some(owner), strict)
    }

    fn create(
        &self,
        id: &WindowId,
        owner: Option<TenantId>,
        strict: bool,
    ) -> Result<(), WindowError> {
        let mut windows = self.lock();
        if windows.contains_key(id) {
            if strict {
                return Err(WindowError::AlreadyExists(id.to_string()));
            }
            return Ok(());
        }
        debug!(window = %id, owner = ?owner, "Created delivery window");
        windows.insert(
            id.clone(),
            Window {
                owner,
                ..Window::default()
            },
        );
        Ok(())
    }

    /// Creates a window owned by `owner` holding `messages`
    ///
    /// The window and its entries appear together, so a cleanup pass can
    /// never observe the window empty. Fails if `id` already exists.
    pub fn create_with(
        &self,
        id: &WindowId,
        owner: TenantId,
        messages: Vec<OutboundMessage>,
    ) -> Result<Vec<FlightKey>, WindowError> {
        let mut windows = self.lock();
        if windows.contains_key(id) {
            return Err(WindowError::AlreadyExists(id.to_string()));
        }

        let mut window = Window {
            owner: Some(owner),
            ..Window::default()
        };
        let keys: Vec<FlightKey> = messages
            .into_iter()
            .map(|message| window.push(message))
            .collect();

        debug!(window = %id, owner = ?window.owner, queued = keys.len(), "Created delivery window");
        windows.insert(id.clone(), window);
        Ok(keys)
    }

    /// Tenant that owns `id`, if the window was created with one
    pub fn owner(&self, id: &WindowId) -> Option<TenantId> {
        self.lock().get(id).and_then(|w| w.owner.clone())
    }

    /// Appends a message to the window and returns its flight key
    pub fn add(&self, id: &WindowId, message: OutboundMessage) -> Result<FlightKey, WindowError> {
        self.with_window(id, |window| Ok(window.push(message)))
    }

    /// Returns a copy of the message stored under `key`
    ///
    /// Works for pending and in-flight entries; settled entries are gone.
    pub fn get_data(&self, id: &WindowId, key: &FlightKey) -> Result<OutboundMessage, WindowError> {
        self.with_window(id, |window| {
            window
                .data
                .get(key)
                .cloned()
                .ok_or_else(|| flight_not_found(id, key))
        })
    }

    /// Moves the oldest pending entry into flight if a slot is free
    pub fn next_ready(&self, id: &WindowId) -> Result<Option<FlightKey>, WindowError> {
        let max_in_flight = self.max_in_flight;
        self.with_window(id, |window| {
            if window.in_flight.len() >= max_in_flight {
                return Ok(None);
            }
            let Some(key) = window.pending.pop_front() else {
                return Ok(None);
            };
            window.in_flight.insert(key, Instant::now());
            Ok(Some(key))
        })
    }

    /// Marks an in-flight entry as delivered and frees its slot
    pub fn acknowledge(&self, id: &WindowId, key: &FlightKey) -> Result<(), WindowError> {
        self.with_window(id, |window| {
            if window.in_flight.remove(key).is_none() {
                return Err(flight_not_found(id, key));
            }
            window.data.remove(key);
            window.delivered += 1;
            Ok(())
        })
    }

    /// Drops every in-flight entry older than the flight TTL
    ///
    /// Returns the keys that expired. Expired entries are not re-queued.
    pub fn clear_expired(&self, id: &WindowId) -> Result<Vec<FlightKey>, WindowError> {
        let ttl = self.flight_ttl;
        let now = Instant::now();
        self.with_window(id, |window| {
            let expired: Vec<FlightKey> = window
                .in_flight
                .iter()
                .filter(|(_, started)| now.duration_since(**started) >= ttl)
                .map(|(key, _)| *key)
                .collect();
            for key in &expired {
                window.in_flight.remove(key);
                window.data.remove(key);
            }
            window.expired += expired.len() as u64;
            Ok(expired)
        })
    }

    /// Counters for one window
    pub fn stats(&self, id: &WindowId) -> Result<WindowStats, WindowError> {
        self.with_window(id, |window| Ok(window.stats()))
    }

    /// Ids of all windows, in no particular order
    pub fn window_ids(&self) -> Vec<WindowId> {
        self.lock().keys().cloned().collect()
    }

    /// True when the window has nothing pending and nothing in flight
    pub fn is_window_empty(&self, id: &WindowId) -> Result<bool, WindowError> {
        self.with_window(id, |window| Ok(window.is_idle()))
    }

    /// Removes a window and everything in it; returns whether it existed
    pub fn remove_window(&self, id: &WindowId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Cleanup pass for one window; returns whether it was removed
    ///
    /// A window is removed once it has been idle on two consecutive passes.
    /// A window created or refilled since the previous pass survives, and
    /// the counters of a settled window stay readable for one more interval.
    pub(crate) fn remove_if_idle(&self, id: &WindowId) -> bool {
        let mut windows = self.lock();
        let Some(window) = windows.get_mut(id) else {
            return false;
        };
        if !window.is_idle() {
            window.idle_seen = false;
            return false;
        }
        if !window.idle_seen {
            window.idle_seen = true;
            return false;
        }
        windows.remove(id);
        true
    }
}

fn flight_not_found(id: &WindowId, key: &FlightKey) -> WindowError {
    WindowError::FlightNotFound {
        window: id.to_string(),
        key: key.to_string(),
    }
}
