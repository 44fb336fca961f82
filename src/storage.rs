//! SQLite storage for session events, plus the session-state snapshot.
//!
//! Event writes are fire-and-forget from the store's perspective: the
//! executor queues them onto a dedicated worker that owns the connection,
//! serializing database mutation order. Duplicate inserts on retry are
//! acceptable; offer records are deduplicated upstream by content hash.

use crate::store::effect::{EventRecord, OfferOutcome, RecordKind};
use crate::store::state::SessionState;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persisted session event row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: i64,
    pub kind: String,
    pub offer_hash: Option<String>,
    pub detail: Option<String>,
    pub status: Option<String>,
    pub recorded_at: String,
}

/// SQLite event store
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                offer_hash TEXT,
                detail TEXT,
                status TEXT,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_session_events_kind ON session_events(kind);
            CREATE INDEX IF NOT EXISTS idx_session_events_hash ON session_events(offer_hash);
            "#,
        )?;
        Ok(())
    }

    /// Insert one event record; timestamps are stamped here, not in the
    /// reducer. Returns the new row id.
    pub fn insert(&self, record: &EventRecord) -> Result<i64, StorageError> {
        let recorded_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO session_events (kind, offer_hash, detail, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.kind.as_str(),
                record.offer_hash,
                record.detail,
                recorded_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update the status of the most recent offer-seen record for a hash.
    /// Missing rows are not an error: the insert may still be in flight
    /// or may have been dropped, and the status write is best-effort.
    pub fn update_offer_status(
        &self,
        offer_hash: &str,
        outcome: OfferOutcome,
    ) -> Result<bool, StorageError> {
        let status = outcome.record_kind().as_str();
        let updated = self.conn.execute(
            "UPDATE session_events SET status = ?1
             WHERE id = (
                 SELECT id FROM session_events
                 WHERE offer_hash = ?2 AND kind = 'offer_seen'
                 ORDER BY id DESC LIMIT 1
             )",
            params![status, offer_hash],
        )?;
        if updated == 0 {
            warn!("No offer_seen record found for hash {}", offer_hash);
        }
        Ok(updated > 0)
    }

    /// Fetch the most recent events, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<SessionEvent>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, offer_hash, detail, status, recorded_at
             FROM session_events ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SessionEvent {
                id: row.get(0)?,
                kind: row.get(1)?,
                offer_hash: row.get(2)?,
                detail: row.get(3)?,
                status: row.get(4)?,
                recorded_at: row.get(5)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Count events of one kind
    pub fn count_kind(&self, kind: RecordKind) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM session_events WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Persisted session-state snapshot.
///
/// Written on every transition, restored at startup. A corrupt or
/// unreadable snapshot falls back to `Initializing` rather than failing.
pub struct StateSnapshot;

impl StateSnapshot {
    /// Write the current state to the given path, best effort
    pub fn save(path: &Path, state: &SessionState) {
        let result = (|| -> Result<(), StorageError> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(state)?;
            std::fs::write(path, json)?;
            Ok(())
        })();

        if let Err(e) = result {
            warn!("Failed to persist state snapshot: {}", e);
        }
    }

    /// Restore the persisted state, falling back to `Initializing`
    pub fn restore(path: &Path) -> SessionState {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(state) => {
                    info!("Restored session state from {:?}", path);
                    state
                }
                Err(e) => {
                    warn!("Corrupt state snapshot ({}), starting fresh", e);
                    SessionState::Initializing
                }
            },
            Err(_) => {
                info!("No state snapshot at {:?}, starting fresh", path);
                SessionState::Initializing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_recent() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(&EventRecord::new(RecordKind::DashStarted))
            .unwrap();
        store
            .insert(
                &EventRecord::new(RecordKind::OfferSeen)
                    .with_hash("abc123")
                    .with_detail("$7.50 / 2.5 mi"),
            )
            .unwrap();

        let events = store.recent(10).unwrap();
        assert_eq!(events.len(), 2);
        // Newest first
        assert_eq!(events[0].kind, "offer_seen");
        assert_eq!(events[0].offer_hash.as_deref(), Some("abc123"));
        assert_eq!(events[1].kind, "dash_started");
    }

    #[test]
    fn test_update_offer_status() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(&EventRecord::new(RecordKind::OfferSeen).with_hash("abc123"))
            .unwrap();

        let updated = store
            .update_offer_status("abc123", OfferOutcome::Accepted)
            .unwrap();
        assert!(updated);

        let events = store.recent(1).unwrap();
        assert_eq!(events[0].status.as_deref(), Some("offer_accepted"));
    }

    #[test]
    fn test_update_missing_offer_is_not_an_error() {
        let store = EventStore::open_in_memory().unwrap();
        let updated = store
            .update_offer_status("nope", OfferOutcome::TimedOut)
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn test_update_targets_latest_seen_record() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(&EventRecord::new(RecordKind::OfferSeen).with_hash("abc123"))
            .unwrap();
        store
            .insert(&EventRecord::new(RecordKind::OfferSeen).with_hash("abc123"))
            .unwrap();

        store
            .update_offer_status("abc123", OfferOutcome::Declined)
            .unwrap();

        let events = store.recent(2).unwrap();
        assert_eq!(events[0].status.as_deref(), Some("offer_declined"));
        assert_eq!(events[1].status, None);
    }

    #[test]
    fn test_count_kind() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(&EventRecord::new(RecordKind::DashStarted))
            .unwrap();
        store
            .insert(&EventRecord::new(RecordKind::DashStarted))
            .unwrap();
        assert_eq!(store.count_kind(RecordKind::DashStarted).unwrap(), 2);
        assert_eq!(store.count_kind(RecordKind::DashEnded).unwrap(), 0);
    }

    #[test]
    fn test_state_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = SessionState::AwaitingOffer { pay_so_far: 21.5 };
        StateSnapshot::save(&path, &state);
        assert_eq!(StateSnapshot::restore(&path), state);
    }

    #[test]
    fn test_corrupt_snapshot_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"phase":"not_a_phase"}"#).unwrap();
        assert_eq!(StateSnapshot::restore(&path), SessionState::Initializing);
    }

    #[test]
    fn test_missing_snapshot_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert_eq!(StateSnapshot::restore(&path), SessionState::Initializing);
    }
}
