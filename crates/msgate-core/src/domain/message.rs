//! Outbound message payloads
//!
//! An [`OutboundMessage`] is one `{to_addr, content}` pair queued on a
//! delivery window. A send request addressed to several recipients fans out
//! into one message per address.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A single outbound message waiting in (or travelling through) a delivery window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination address (MSISDN or channel-specific address)
    pub to_addr: String,
    /// Message body; `None` for content-less sends
    pub content: Option<String>,
}

impl OutboundMessage {
    /// Creates a message for a single recipient
    pub fn new(to_addr: impl Into<String>, content: Option<String>) -> Self {
        Self {
            to_addr: to_addr.into(),
            content,
        }
    }

    /// Splits a comma-separated recipient list into one message per address
    ///
    /// Addresses are trimmed and empty segments are skipped. Fails when no
    /// address remains.
    pub fn fan_out(to_addr: &str, content: Option<&str>) -> Result<Vec<Self>, DomainError> {
        let messages: Vec<Self> = to_addr
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| Self::new(addr, content.map(str::to_string)))
            .collect();

        if messages.is_empty() {
            return Err(DomainError::InvalidMessage(
                "to_addr contains no recipients".to_string(),
            ));
        }
        Ok(messages)
    }
}
