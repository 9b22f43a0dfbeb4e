//! msgate Window - Paced outbound delivery
//!
//! A delivery window is a FIFO queue of outbound messages for one
//! conversation. At most `max_in_flight` entries of a window are out with
//! the dispatch handler at any time; an entry that is not acknowledged
//! within `flight_ttl` expires and frees its slot.
//!
//! ## Key Components
//!
//! - [`DeliveryWindowManager`] - window state: create, add, fetch, acknowledge, expire
//! - [`WindowMonitor`] - periodic pacing loop feeding an `IDispatchHandler`
//! - [`WindowStats`] - per-window counters for status queries

pub mod manager;
pub mod monitor;

pub use manager::{DeliveryWindowManager, WindowStats};
pub use monitor::WindowMonitor;

/// Errors raised by delivery window operations
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// No window with this id exists
    #[error("Window not found: {0}")]
    NotFound(String),

    /// Strict creation of a window that already exists
    #[error("Window already exists: {0}")]
    AlreadyExists(String),

    /// The flight key is unknown or no longer in flight
    #[error("Flight {key} not found in window {window}")]
    FlightNotFound {
        /// Window the key was looked up in
        window: String,
        /// The missing flight key
        key: String,
    },
}
