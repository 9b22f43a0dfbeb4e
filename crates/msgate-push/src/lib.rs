//! msgate Push - Relay of window entries to tenant callbacks
//!
//! Delivery windows hand each entry to an `IDispatchHandler`. This crate
//! provides the production handler: it looks up the tenant that owns the
//! window and POSTs the entry as JSON to the tenant's `push_message_url`.
//!
//! ## Key Components
//!
//! - [`PushClient`] - `reqwest` wrapper: timeout, URL credentials as Basic auth
//! - [`PushDispatchHandler`] - `IDispatchHandler` on top of the client
//! - [`PushError`] - relay failures

use std::time::Duration;

pub mod client;
pub mod handler;

pub use client::{PushClient, PushPayload};
pub use handler::PushDispatchHandler;

/// Errors raised while relaying an entry to a tenant callback
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The callback URL could not be parsed
    #[error("Invalid push URL {url}: {reason}")]
    InvalidUrl {
        /// URL as configured, credentials removed
        url: String,
        /// Parser message
        reason: String,
    },

    /// The callback URL is not http or https
    #[error("Unsupported push URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The callback answered with a non-2xx status
    #[error("Push endpoint returned HTTP {status}")]
    UnexpectedStatus {
        /// HTTP status code received
        status: u16,
    },

    /// No answer within the configured timeout
    #[error("Push request timed out after {0:?}")]
    Timeout(Duration),

    /// DNS failure, refused connection or other transport error
    #[error("Push request failed: {0}")]
    Network(String),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
