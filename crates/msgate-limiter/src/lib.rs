//! msgate Limiter - Per-tenant admission control
//!
//! Two tiers guard every send request:
//!
//! - [`DistributedAdmissionGate`]: a ceiling shared by all worker processes,
//!   enforced through an [`ICounterStore`](msgate_core::ports::ICounterStore).
//!   Requests over the ceiling are rejected outright.
//! - [`ConcurrencyLimiterRegistry`]: a per-process limit per key. Requests over
//!   the limit queue in FIFO order until a slot frees up.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use msgate_limiter::ConcurrencyLimiterRegistry;
//!
//! # async fn example() -> Result<(), msgate_limiter::LimiterError> {
//! let registry = ConcurrencyLimiterRegistry::new(1);
//! let permit = registry.acquire("acme").await?;
//! // ... do the work ...
//! permit.release()?;
//! # Ok(())
//! # }
//! ```

pub mod gate;
pub mod keyed;
pub mod registry;
pub mod ticket;

pub use gate::{AdmissionGuard, DistributedAdmissionGate};
pub use keyed::KeyedConcurrencyLimiter;
pub use registry::{ConcurrencyLimiterRegistry, ConcurrencyPermit};
pub use ticket::AdmissionTicket;

/// Errors raised by the process-local concurrency limiter
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// `stop()` was called more often than a matching granted `start()`
    #[error("Can't decrement key below zero: {key}")]
    NegativeConcurrency {
        /// Limiter key whose active count was already zero
        key: String,
    },

    /// The limiter owning a queued ticket went away before granting it
    #[error("Concurrency limiter for {key} was dropped before granting admission")]
    Closed {
        /// Limiter key the ticket was queued on
        key: String,
    },
}

/// Errors raised by the distributed admission gate
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The tenant already has `ceiling` requests in flight
    #[error("Too many concurrent connections for {tenant} (limit {ceiling})")]
    AdmissionRejected {
        /// Tenant whose request was refused
        tenant: String,
        /// Ceiling in force when the request was refused
        ceiling: i64,
    },

    /// The shared counter store failed; admission fails closed
    #[error("Counter store error: {0}")]
    Store(String),

    /// Tenant settings could not be resolved; admission fails closed
    #[error("Tenant configuration error: {0}")]
    Config(String),
}

impl GateError {
    /// Returns `true` when the request was refused because of the ceiling
    pub fn is_rejection(&self) -> bool {
        matches!(self, GateError::AdmissionRejected { .. })
    }
}
