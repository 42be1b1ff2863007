//! SQLite-backed entitlement store.
//!
//! The conditional write is a single `INSERT ... ON CONFLICT DO UPDATE
//! ... WHERE` statement, so the ordering guard and the write execute as
//! one atomic storage operation regardless of how many connections race
//! on the same key.

use crate::error::{StoreError, StoreResult};
use crate::record::{EntitlementRecord, EntitlementStatus, ParseStatusError};
use crate::store::EntitlementStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use subgate_types::{EntitlementKey, Environment, EpochMillis, ParseEnvironmentError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entitlements (
    original_transaction_id TEXT    NOT NULL,
    account_token           TEXT    NOT NULL DEFAULT '',
    status                  TEXT    NOT NULL,
    active_until_ms         INTEGER NOT NULL,
    last_event_key_ms       INTEGER NOT NULL,
    environment             TEXT    NOT NULL,
    created_at_ms           INTEGER NOT NULL,
    updated_at_ms           INTEGER NOT NULL,
    PRIMARY KEY (original_transaction_id, account_token)
);
";

/// Durable entitlement store over a SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be applied.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        // journal_mode reports the resulting mode back, so plain
        // pragma_update would reject the returned row.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }
}

/// The member column is NOT NULL so it can participate in the primary
/// key; the primary holder is stored as the empty string.
fn member_column(key: &EntitlementKey) -> &str {
    key.account_token.as_deref().unwrap_or("")
}

impl EntitlementStore for SqliteStore {
    fn get(&self, key: &EntitlementKey) -> StoreResult<Option<EntitlementRecord>> {
        let conn = self.lock()?;
        let row: Option<(String, i64, i64, String, i64, i64)> = conn
            .query_row(
                "SELECT status, active_until_ms, last_event_key_ms, environment,
                        created_at_ms, updated_at_ms
                 FROM entitlements
                 WHERE original_transaction_id = ?1 AND account_token = ?2",
                params![key.original_transaction_id, member_column(key)],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, active_until, last_event_key, environment, created_at, updated_at)) = row
        else {
            return Ok(None);
        };
        let status: EntitlementStatus = status.parse().map_err(|e: ParseStatusError| {
            StoreError::Unavailable(format!("corrupt status column: {e}"))
        })?;
        let environment: Environment =
            environment.parse().map_err(|e: ParseEnvironmentError| {
                StoreError::Unavailable(format!("corrupt environment column: {e}"))
            })?;
        Ok(Some(EntitlementRecord {
            key: key.clone(),
            status,
            active_until: EpochMillis::from_millis(active_until),
            last_event_key: EpochMillis::from_millis(last_event_key),
            environment,
            created_at: EpochMillis::from_millis(created_at),
            updated_at: EpochMillis::from_millis(updated_at),
        }))
    }

    fn apply_if_newer_or_override(
        &self,
        key: &EntitlementKey,
        candidate_key: EpochMillis,
        is_override: bool,
        record: EntitlementRecord,
    ) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO entitlements
                 (original_transaction_id, account_token, status, active_until_ms,
                  last_event_key_ms, environment, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (original_transaction_id, account_token) DO UPDATE SET
                 status            = excluded.status,
                 active_until_ms   = excluded.active_until_ms,
                 last_event_key_ms = MAX(entitlements.last_event_key_ms, excluded.last_event_key_ms),
                 environment       = excluded.environment,
                 updated_at_ms     = excluded.updated_at_ms
             WHERE ?9 OR ?10 > entitlements.last_event_key_ms",
            params![
                key.original_transaction_id,
                member_column(key),
                record.status.as_str(),
                record.active_until.as_millis(),
                record.last_event_key.as_millis(),
                record.environment.as_str(),
                record.created_at.as_millis(),
                record.updated_at.as_millis(),
                is_override,
                candidate_key.as_millis(),
            ],
        )?;
        Ok(changed > 0)
    }
}
