//! Domain error types
//!
//! This module defines error types raised while constructing domain values,
//! such as malformed tenant identifiers or empty message payloads.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Tenant identifier is empty or contains forbidden characters
    #[error("Invalid tenant id: {0}")]
    InvalidTenantId(String),

    /// Window (conversation) identifier is empty or malformed
    #[error("Invalid window id: {0}")]
    InvalidWindowId(String),

    /// Flight key could not be parsed
    #[error("Invalid flight key: {0}")]
    InvalidFlightKey(String),

    /// Outbound message payload failed validation
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
