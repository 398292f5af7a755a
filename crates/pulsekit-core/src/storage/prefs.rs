//! SQLite-backed key-value store for scalar SDK state.
//!
//! Holds everything that must survive process death outside the event
//! queue itself:
//! - Device hash and tester id
//! - Campaign start date
//! - Session-start marker (for recovering interrupted sessions)
//! - Daily accumulated duration with its calendar date key
//! - Last daily check-in timestamp
//! - Tracking-enabled flag

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::DatabaseError;

const KEY_DEVICE_HASH: &str = "device_hash";
const KEY_TESTER_ID: &str = "tester_id";
const KEY_CAMPAIGN_START: &str = "campaign_start_ms";
const KEY_SESSION_START: &str = "session_start_ms";
const KEY_DAILY_SECONDS: &str = "daily_duration_secs";
const KEY_DAILY_DATE: &str = "daily_duration_date";
const KEY_LAST_CHECKIN: &str = "last_checkin_ms";
const KEY_TRACKING_ENABLED: &str = "tracking_enabled";

/// Daily accumulated duration tagged with the calendar day it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyDuration {
    pub seconds: i64,
    pub date_key: String,
}

/// Persistent scalar state.
///
/// The connection sits behind a mutex so the store can be shared between the
/// UI-side session tracker and the context.
pub struct PrefsStore {
    conn: Mutex<Connection>,
}

impl PrefsStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store.
    pub fn kv_remove(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>, DatabaseError> {
        Ok(self.kv_get(key)?.and_then(|v| v.parse::<i64>().ok()))
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<(), DatabaseError> {
        self.kv_set(key, &value.to_string())
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn device_hash(&self) -> Result<Option<String>, DatabaseError> {
        self.kv_get(KEY_DEVICE_HASH)
    }

    pub fn set_device_hash(&self, hash: &str) -> Result<(), DatabaseError> {
        self.kv_set(KEY_DEVICE_HASH, hash)
    }

    pub fn tester_id(&self) -> Result<Option<String>, DatabaseError> {
        self.kv_get(KEY_TESTER_ID)
    }

    pub fn set_tester_id(&self, tester_id: &str) -> Result<(), DatabaseError> {
        self.kv_set(KEY_TESTER_ID, tester_id)
    }

    // ── Campaign ─────────────────────────────────────────────────────

    /// Campaign start in epoch ms; 0 when unset.
    pub fn campaign_start_ms(&self) -> Result<i64, DatabaseError> {
        Ok(self.get_i64(KEY_CAMPAIGN_START)?.unwrap_or(0))
    }

    pub fn set_campaign_start_ms(&self, at_ms: i64) -> Result<(), DatabaseError> {
        self.set_i64(KEY_CAMPAIGN_START, at_ms)
    }

    // ── Session ──────────────────────────────────────────────────────

    pub fn session_start_ms(&self) -> Result<Option<i64>, DatabaseError> {
        self.get_i64(KEY_SESSION_START)
    }

    pub fn set_session_start_ms(&self, at_ms: i64) -> Result<(), DatabaseError> {
        self.set_i64(KEY_SESSION_START, at_ms)
    }

    pub fn clear_session_start(&self) -> Result<(), DatabaseError> {
        self.kv_remove(KEY_SESSION_START)
    }

    pub fn daily_duration(&self) -> Result<DailyDuration, DatabaseError> {
        Ok(DailyDuration {
            seconds: self.get_i64(KEY_DAILY_SECONDS)?.unwrap_or(0),
            date_key: self.kv_get(KEY_DAILY_DATE)?.unwrap_or_default(),
        })
    }

    pub fn set_daily_duration(&self, daily: &DailyDuration) -> Result<(), DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![KEY_DAILY_SECONDS, daily.seconds.to_string()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![KEY_DAILY_DATE, daily.date_key],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Last check-in in epoch ms; 0 when none has fired yet.
    pub fn last_checkin_ms(&self) -> Result<i64, DatabaseError> {
        Ok(self.get_i64(KEY_LAST_CHECKIN)?.unwrap_or(0))
    }

    pub fn set_last_checkin_ms(&self, at_ms: i64) -> Result<(), DatabaseError> {
        self.set_i64(KEY_LAST_CHECKIN, at_ms)
    }

    // ── Tracking ─────────────────────────────────────────────────────

    /// Tracking is enabled unless explicitly switched off.
    pub fn tracking_enabled(&self) -> Result<bool, DatabaseError> {
        Ok(self
            .kv_get(KEY_TRACKING_ENABLED)?
            .map(|v| v != "false")
            .unwrap_or(true))
    }

    pub fn set_tracking_enabled(&self, enabled: bool) -> Result<(), DatabaseError> {
        self.kv_set(KEY_TRACKING_ENABLED, if enabled { "true" } else { "false" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kv_store() {
        let prefs = PrefsStore::open_memory().unwrap();
        assert!(prefs.kv_get("test").unwrap().is_none());
        prefs.kv_set("test", "hello").unwrap();
        assert_eq!(prefs.kv_get("test").unwrap().unwrap(), "hello");
        prefs.kv_remove("test").unwrap();
        assert!(prefs.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn unset_scalars_have_defaults() {
        let prefs = PrefsStore::open_memory().unwrap();
        assert_eq!(prefs.campaign_start_ms().unwrap(), 0);
        assert_eq!(prefs.last_checkin_ms().unwrap(), 0);
        assert_eq!(prefs.session_start_ms().unwrap(), None);
        assert_eq!(prefs.daily_duration().unwrap(), DailyDuration::default());
        assert!(prefs.tracking_enabled().unwrap());
    }

    #[test]
    fn session_marker_set_and_clear() {
        let prefs = PrefsStore::open_memory().unwrap();
        prefs.set_session_start_ms(1_234).unwrap();
        assert_eq!(prefs.session_start_ms().unwrap(), Some(1_234));
        prefs.clear_session_start().unwrap();
        assert_eq!(prefs.session_start_ms().unwrap(), None);
    }

    #[test]
    fn daily_duration_written_together() {
        let prefs = PrefsStore::open_memory().unwrap();
        let daily = DailyDuration {
            seconds: 190,
            date_key: "2025-03-01".into(),
        };
        prefs.set_daily_duration(&daily).unwrap();
        assert_eq!(prefs.daily_duration().unwrap(), daily);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.db");
        {
            let prefs = PrefsStore::open(&path).unwrap();
            prefs.set_last_checkin_ms(99).unwrap();
            prefs.set_tracking_enabled(false).unwrap();
        }
        let prefs = PrefsStore::open(&path).unwrap();
        assert_eq!(prefs.last_checkin_ms().unwrap(), 99);
        assert!(!prefs.tracking_enabled().unwrap());
    }
}
