//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! gateway core. Ports are interfaces that the admission gate and delivery
//! window depend on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICounterStore`] - Shared, process-external admission counters
//! - [`ITenantConfigResolver`] - Per-tenant live settings (ceilings, push URLs)
//! - [`IDispatchHandler`] - Delivery of window entries once they are in flight

pub mod counter_store;
pub mod dispatch;
pub mod tenant_config;

pub use counter_store::{counter_key, ICounterStore};
pub use dispatch::IDispatchHandler;
pub use tenant_config::{ITenantConfigResolver, TenantSettings};
