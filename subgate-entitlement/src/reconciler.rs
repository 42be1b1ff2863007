//! The lifecycle state machine.
//!
//! States run `Pending -> Active -> Grace -> Expired`, with `Revoked`
//! reachable from anywhere. Events reconcile against the stored record
//! through a read-compute-conditional-write cycle; the transition itself
//! is a pure function so ordering scenarios are unit-testable without
//! storage.

use crate::error::{ReconcileError, ReconcileResult};
use crate::record::{EntitlementRecord, EntitlementStatus, GRACE_WINDOW_DAYS};
use crate::store::EntitlementStore;
use std::sync::Arc;
use tracing::{debug, warn};
use subgate_types::{EntitlementEvent, EpochMillis, EventKind};

/// Rounds of the read-compute-write cycle before giving up.
const MAX_COMMIT_ROUNDS: usize = 8;

/// Whether an event with `candidate` ordering key may replace state last
/// written under `recorded`.
///
/// Overriding events always win. An equal key is a redelivered
/// duplicate: reported as success upstream, but it does not re-apply, so
/// applying the same event twice leaves the record byte-identical.
#[must_use]
pub const fn event_supersedes(
    candidate: EpochMillis,
    recorded: EpochMillis,
    is_override: bool,
) -> bool {
    is_override || candidate.as_millis() > recorded.as_millis()
}

/// Result of computing a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The event produces this record.
    Next(EntitlementRecord),
    /// The event is stale or a duplicate; the stored record stands.
    Stale,
}

/// Computes the record that applying `event` at `now` would produce.
///
/// Pure: reads nothing but its arguments. A key with no stored record
/// is in the implicit `Pending` state and accepts any event.
#[must_use]
pub fn transition(
    current: Option<&EntitlementRecord>,
    event: &EntitlementEvent,
    now: EpochMillis,
) -> Transition {
    if let Some(record) = current {
        if !event_supersedes(event.ordering_key, record.last_event_key, event.kind.is_override()) {
            return Transition::Stale;
        }
    }

    let (status, active_until) = match event.kind {
        EventKind::Activated => {
            let expires = event.expires_at.unwrap_or(event.ordering_key);
            let status = if now < expires {
                EntitlementStatus::Active
            } else {
                EntitlementStatus::Expired
            };
            (status, expires)
        }
        EventKind::Renewed => (
            EntitlementStatus::Active,
            event.expires_at.unwrap_or(event.ordering_key),
        ),
        // A failed renewal carries no new expiry; the platform retries
        // billing for a fixed window during which access continues.
        EventKind::FailedRenewGrace => (
            EntitlementStatus::Grace,
            now.plus_days(GRACE_WINDOW_DAYS),
        ),
        EventKind::GraceExpired | EventKind::Expired | EventKind::Refunded => {
            (EntitlementStatus::Expired, event.ordering_key)
        }
        EventKind::Revoked => (EntitlementStatus::Revoked, event.ordering_key),
    };

    let recorded_key = current.map(|r| r.last_event_key);
    Transition::Next(EntitlementRecord {
        key: event.key.clone(),
        status,
        active_until,
        last_event_key: recorded_key.map_or(event.ordering_key, |k| k.max(event.ordering_key)),
        environment: event.environment,
        created_at: current.map_or(now, |r| r.created_at),
        updated_at: now,
    })
}

/// Outcome of applying one verified event.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The event advanced the record to this state.
    Applied(EntitlementRecord),
    /// The event was stale or already applied; the stored record stands.
    Stale(EntitlementRecord),
}

impl ReconcileOutcome {
    /// The record as of this outcome.
    #[must_use]
    pub fn record(&self) -> &EntitlementRecord {
        match self {
            Self::Applied(record) | Self::Stale(record) => record,
        }
    }

    /// Consumes the outcome, returning the record.
    #[must_use]
    pub fn into_record(self) -> EntitlementRecord {
        match self {
            Self::Applied(record) | Self::Stale(record) => record,
        }
    }
}

/// Applies verified events to the store.
///
/// Per-key serialization comes from the store's conditional write, not
/// from a lock: losing the write means another event landed in between,
/// so the cycle re-reads and recomputes. Unrelated keys never contend.
pub struct LifecycleReconciler {
    store: Arc<dyn EntitlementStore>,
}

impl LifecycleReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self { store }
    }

    /// Applies one verified event at the current time.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::EnvironmentMismatch`] if the event and the
    /// stored record disagree on environment; storage failures pass
    /// through. Stale and duplicate events are not errors — they resolve
    /// to [`ReconcileOutcome::Stale`], which callers report as success
    /// so the sender stops redelivering.
    pub fn apply(&self, event: &EntitlementEvent) -> ReconcileResult<ReconcileOutcome> {
        self.apply_at(event, EpochMillis::now())
    }

    /// [`Self::apply`] with an explicit clock; tests drive this directly.
    pub fn apply_at(
        &self,
        event: &EntitlementEvent,
        now: EpochMillis,
    ) -> ReconcileResult<ReconcileOutcome> {
        for round in 0..MAX_COMMIT_ROUNDS {
            let current = self.store.get(&event.key)?;
            if let Some(record) = &current {
                if record.environment != event.environment {
                    return Err(ReconcileError::EnvironmentMismatch {
                        event: event.environment,
                        record: record.environment,
                    });
                }
            }

            match (transition(current.as_ref(), event, now), current) {
                (Transition::Stale, Some(record)) => {
                    debug!(
                        key = %event.key,
                        ordering_key = event.ordering_key.as_millis(),
                        "stale event left record unchanged"
                    );
                    return Ok(ReconcileOutcome::Stale(record));
                }
                // A missing record accepts any event, so Stale implies
                // a record existed; re-read if the snapshot vanished
                // under us.
                (Transition::Stale, None) => continue,
                (Transition::Next(next), _) => {
                    if self.store.apply_if_newer_or_override(
                        &event.key,
                        event.ordering_key,
                        event.kind.is_override(),
                        next.clone(),
                    )? {
                        debug!(key = %event.key, status = %next.status, "event applied");
                        return Ok(ReconcileOutcome::Applied(next));
                    }
                    debug!(key = %event.key, round, "conditional write lost, retrying");
                }
            }
        }
        warn!(key = %event.key, "conditional write conflicted on every round");
        Err(ReconcileError::Conflict)
    }
}
