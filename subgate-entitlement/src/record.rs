//! The authoritative access-rights record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subgate_types::{EntitlementKey, Environment, EpochMillis};
use thiserror::Error;

/// Days of continued access after a failed renewal while the platform
/// retries billing.
pub const GRACE_WINDOW_DAYS: i64 = 16;

/// Where an entitlement sits in its lifecycle.
///
/// `Pending` is the implicit state of a key with no stored record; it
/// never appears in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Pending,
    Active,
    Grace,
    Expired,
    Revoked,
}

impl EntitlementStatus {
    /// Returns true if this status can grant access (subject to expiry).
    #[must_use]
    pub const fn is_access_status(self) -> bool {
        matches!(self, Self::Active | Self::Grace)
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Grace => "grace",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a stored status value.
#[derive(Debug, Error)]
#[error("unrecognized entitlement status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for EntitlementStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "grace" => Ok(Self::Grace),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// The materialized record for one (lineage, member) key.
///
/// Records are only ever transitioned, never deleted — the row doubles
/// as the audit trail and the idempotency anchor for redelivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub key: EntitlementKey,
    pub status: EntitlementStatus,
    /// Access is granted while `now < active_until` and the status
    /// allows it.
    pub active_until: EpochMillis,
    /// Ordering key of the most recently applied event; the guard
    /// rejects anything older.
    pub last_event_key: EpochMillis,
    pub environment: Environment,
    pub created_at: EpochMillis,
    pub updated_at: EpochMillis,
}

impl EntitlementRecord {
    /// Returns true if this record grants access at `now`.
    #[must_use]
    pub fn grants_access(&self, now: EpochMillis) -> bool {
        self.status.is_access_status() && now < self.active_until
    }
}
