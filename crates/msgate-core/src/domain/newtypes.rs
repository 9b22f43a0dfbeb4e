//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the identifiers that partition gateway state.
//! Each newtype checks its invariants at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// TenantId
// ============================================================================

/// Identifier of a tenant (account) on the platform
///
/// Used as the key for both the distributed admission counter and the
/// per-worker concurrency limiter. Must be non-empty and must not contain
/// whitespace or the `:` separator used by counter store keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a validated TenantId
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidTenantId(
                "tenant id must not be empty".to_string(),
            ));
        }
        if value.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(DomainError::InvalidTenantId(value));
        }
        Ok(Self(value))
    }

    /// Get the tenant id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

// ============================================================================
// WindowId
// ============================================================================

/// Identifier of a delivery window (one per conversation)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowId(String);

impl WindowId {
    /// Create a validated WindowId
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidWindowId(
                "window id must not be empty".to_string(),
            ));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidWindowId(value));
        }
        Ok(Self(value))
    }

    /// Generate a fresh conversation key
    ///
    /// Uses the simple (hyphen-less) form of a random UUID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Get the window id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WindowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WindowId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for WindowId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WindowId> for String {
    fn from(id: WindowId) -> Self {
        id.0
    }
}

// ============================================================================
// FlightKey
// ============================================================================

/// Unique key of a single entry inside a delivery window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightKey(Uuid);

impl FlightKey {
    /// Create a new random FlightKey
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FlightKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FlightKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for FlightKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidFlightKey(format!("{s}: {e}")))
    }
}
