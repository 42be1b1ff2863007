//! Keyed storage for entitlement records.
//!
//! The only mutation primitive is an atomic conditional write: the
//! candidate ordering key must beat the stored one, or the event must be
//! overriding, for the write to land. There is no delete — records are
//! retained indefinitely for audit and idempotence.

use crate::error::{StoreError, StoreResult};
use crate::record::EntitlementRecord;
use std::collections::HashMap;
use std::sync::Mutex;
use subgate_types::{EntitlementKey, EpochMillis};

/// Durable keyed storage contract for entitlement records.
pub trait EntitlementStore: Send + Sync {
    /// Fetches the record for `key`, if one was ever created.
    fn get(&self, key: &EntitlementKey) -> StoreResult<Option<EntitlementRecord>>;

    /// Writes `record` iff `candidate_key` is strictly newer than the
    /// stored `last_event_key`, or unconditionally when `is_override`.
    ///
    /// Atomic with respect to concurrent callers on the same key: the
    /// guard and the write are one operation, never a read-then-write
    /// visible to others. On an overwrite the stored `created_at` is
    /// preserved and `last_event_key` never regresses.
    ///
    /// Returns whether the write landed; `false` is the stale/duplicate
    /// no-op, not an error.
    fn apply_if_newer_or_override(
        &self,
        key: &EntitlementKey,
        candidate_key: EpochMillis,
        is_override: bool,
        record: EntitlementRecord,
    ) -> StoreResult<bool>;
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<EntitlementKey, EntitlementRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<EntitlementKey, EntitlementRecord>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("record table mutex poisoned".to_string()))
    }
}

impl EntitlementStore for MemoryStore {
    fn get(&self, key: &EntitlementKey) -> StoreResult<Option<EntitlementRecord>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn apply_if_newer_or_override(
        &self,
        key: &EntitlementKey,
        candidate_key: EpochMillis,
        is_override: bool,
        mut record: EntitlementRecord,
    ) -> StoreResult<bool> {
        let mut records = self.lock()?;
        if let Some(current) = records.get(key) {
            if !is_override && candidate_key <= current.last_event_key {
                return Ok(false);
            }
            record.last_event_key = record.last_event_key.max(current.last_event_key);
            record.created_at = current.created_at;
        }
        records.insert(key.clone(), record);
        Ok(true)
    }
}
