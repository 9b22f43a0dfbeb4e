//! Domain types
//!
//! This module contains the core domain types for msgate:
//! - Newtypes for tenant, window and flight identifiers
//! - Outbound message payloads
//! - Domain-specific error types

pub mod errors;
pub mod message;
pub mod newtypes;

// Re-export commonly used types
pub use errors::DomainError;
pub use message::OutboundMessage;
pub use newtypes::{FlightKey, TenantId, WindowId};
