//! Strongly-typed subscription identifier.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a web hook subscription.
///
/// The nil UUID means "not yet persisted"; stores replace it with a fresh
/// identifier on first `subscribe`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered) so store ordering follows creation order.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The "not yet persisted" identifier.
    pub const fn unassigned() -> Self {
        Self(Uuid::nil())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_assigned(&self) -> bool {
        !self.0.is_nil()
    }
}

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for SubscriptionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<SubscriptionId> for Uuid {
    fn from(value: SubscriptionId) -> Self {
        value.0
    }
}

impl FromStr for SubscriptionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("SubscriptionId: {e}")))?;
        Ok(Self(uuid))
    }
}
