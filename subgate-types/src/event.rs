//! Canonical events decoded from verified proofs.
//!
//! Both proof sources — a transaction token submitted by the client app
//! and a lifecycle notification pushed by the billing platform — decode
//! into the same event record, so the reconciler has a single input
//! shape.

use crate::{EntitlementKey, Environment, EpochMillis};
use serde::{Deserialize, Serialize};

/// What a verified proof says happened to a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A client presented a valid transaction proof, or the platform
    /// reported a new subscription.
    Activated,
    /// The subscription renewed for another period.
    Renewed,
    /// A renewal attempt failed and the platform entered billing retry
    /// with a grace period.
    FailedRenewGrace,
    /// The billing-retry grace period ran out.
    GraceExpired,
    /// The subscription lapsed.
    Expired,
    /// The platform refunded the purchase.
    Refunded,
    /// Access was revoked, e.g. the purchaser left the family group.
    Revoked,
}

impl EventKind {
    /// Overriding events carry authoritative billing-side facts and are
    /// applied regardless of the ordering guard.
    #[must_use]
    pub const fn is_override(self) -> bool {
        matches!(self, Self::Refunded | Self::Revoked)
    }
}

/// The canonical record decoded from one verified proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementEvent {
    /// The entitlement this event targets.
    pub key: EntitlementKey,
    pub kind: EventKind,
    pub environment: Environment,
    /// Signing timestamp of the proof; the ordering guard compares these
    /// to reject stale and duplicate deliveries.
    pub ordering_key: EpochMillis,
    /// New expiry, for events that carry one (activation, renewal).
    pub expires_at: Option<EpochMillis>,
}
