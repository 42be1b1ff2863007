//! Shared test helpers for reconciler and store tests.

#![allow(dead_code)]

use subgate_types::{EntitlementEvent, EntitlementKey, Environment, EpochMillis, EventKind};

pub const NOW: EpochMillis = EpochMillis::from_millis(1_700_000_000_000);

/// An event with an explicit expiry (activations, renewals).
pub fn event_with_expiry(
    key: &EntitlementKey,
    kind: EventKind,
    ordering_ms: i64,
    expires_ms: i64,
) -> EntitlementEvent {
    EntitlementEvent {
        key: key.clone(),
        kind,
        environment: Environment::Production,
        ordering_key: EpochMillis::from_millis(ordering_ms),
        expires_at: Some(EpochMillis::from_millis(expires_ms)),
    }
}

/// An event without an expiry (grace, lapse, refund, revoke).
pub fn event(key: &EntitlementKey, kind: EventKind, ordering_ms: i64) -> EntitlementEvent {
    EntitlementEvent {
        key: key.clone(),
        kind,
        environment: Environment::Production,
        ordering_key: EpochMillis::from_millis(ordering_ms),
        expires_at: None,
    }
}

pub fn days(n: i64) -> i64 {
    n * 24 * 60 * 60 * 1000
}
