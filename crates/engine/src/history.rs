//! Durable cycle history.
//!
//! Append-only SQLite store of every published cycle and its conjunction
//! events, kept for trend analysis and to restore the latest snapshot after a
//! restart.
//!
//! # Guarantees
//!
//! - Versions increase by exactly one per appended cycle
//! - Each cycle's `previous_fingerprint` equals the fingerprint of the cycle
//!   before it (the first one chains to [`GENESIS_FINGERPRINT`])
//! - Each stored snapshot hashes to its recorded fingerprint
//! - Rows are never updated or deleted
//!
//! A startup continuity check walks the whole chain. A broken chain marks the
//! store corrupted and every later append is refused.

use crate::store::{CycleSummary, PublishedCycle, GENESIS_FINGERPRINT};
use orbitwatch_core::ConjunctionEvent;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// History store health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryHealth {
    Ok,
    Corrupted {
        /// Last version that passed every check
        last_good_version: Option<u64>,
        first_bad_version: u64,
        reason: String,
    },
}

impl HistoryHealth {
    pub fn is_ok(&self) -> bool {
        matches!(self, HistoryHealth::Ok)
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Version violation: expected {expected}, got {actual}")]
    VersionViolation { expected: u64, actual: u64 },

    #[error("Chain violation: expected previous fingerprint {expected}, got {actual}")]
    ChainViolation { expected: String, actual: String },

    #[error("Cycle not found: version={0}")]
    NotFound(u64),

    #[error("History corrupted: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Default, Clone)]
pub struct HistoryMetrics {
    pub cycles_appended_total: u64,
    pub events_appended_total: u64,
    pub startup_checks_total: u64,
    pub corruption_detections_total: u64,
}

/// SQLite-backed cycle history
pub struct CycleHistory {
    conn: Connection,
    health: HistoryHealth,
    metrics: HistoryMetrics,
}

struct ChainRow {
    version: u64,
    fingerprint: String,
    previous_fingerprint: String,
    snapshot_json: String,
    recorded_events: u64,
    stored_events: u64,
}

fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

impl CycleHistory {
    /// Open or create the history at `path` and verify its chain.
    ///
    /// A corrupted chain does not fail the open; the store comes back with
    /// [`HistoryHealth::Corrupted`] and refuses appends.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening cycle history");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn)
    }

    /// Non-durable history, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        let mut history = Self {
            conn,
            health: HistoryHealth::Ok,
            metrics: HistoryMetrics::default(),
        };
        match history.startup_continuity_check() {
            Ok(()) | Err(HistoryError::Corrupted(_)) => Ok(history),
            Err(e) => Err(e),
        }
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cycles (
                version INTEGER PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                previous_fingerprint TEXT NOT NULL,
                evaluation_epoch_s REAL NOT NULL,
                published_at_ms INTEGER NOT NULL,
                total_tracked INTEGER NOT NULL,
                event_count INTEGER NOT NULL,
                kessler_risk_index REAL NOT NULL,
                snapshot_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cycle_events (
                version INTEGER NOT NULL REFERENCES cycles(version),
                event_id TEXT NOT NULL,
                primary_id TEXT NOT NULL,
                secondary_id TEXT NOT NULL,
                tca_epoch_s REAL NOT NULL,
                miss_distance_km REAL NOT NULL,
                collision_probability REAL NOT NULL,
                risk_level TEXT NOT NULL,
                event_json TEXT NOT NULL,
                PRIMARY KEY (version, event_id)
            );

            CREATE INDEX IF NOT EXISTS idx_cycle_events_primary ON cycle_events(primary_id);
            CREATE INDEX IF NOT EXISTS idx_cycle_events_secondary ON cycle_events(secondary_id);
            CREATE INDEX IF NOT EXISTS idx_cycles_published ON cycles(published_at_ms);
            "#,
        )?;
        Ok(())
    }

    /// Append a published cycle and its events in one transaction.
    pub fn append(&mut self, cycle: &PublishedCycle) -> Result<()> {
        if !self.health.is_ok() {
            warn!(version = cycle.version, "Attempted to append to corrupted history");
            return Err(HistoryError::Corrupted(
                "cannot append to corrupted history".to_string(),
            ));
        }

        let snapshot_json = serde_json::to_string(&cycle.snapshot)?;
        let tx = self.conn.transaction()?;

        let last: Option<(u64, String)> = tx
            .query_row(
                "SELECT version, fingerprint FROM cycles ORDER BY version DESC LIMIT 1",
                [],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get(1)?)),
            )
            .optional()?;

        let (expected_version, expected_previous) = match last {
            Some((version, fingerprint)) => (version + 1, fingerprint),
            None => (cycle.version.max(1), GENESIS_FINGERPRINT.to_string()),
        };
        if cycle.version != expected_version {
            return Err(HistoryError::VersionViolation {
                expected: expected_version,
                actual: cycle.version,
            });
        }
        if cycle.previous_fingerprint != expected_previous {
            return Err(HistoryError::ChainViolation {
                expected: expected_previous,
                actual: cycle.previous_fingerprint.clone(),
            });
        }

        tx.execute(
            r#"
            INSERT INTO cycles (
                version, fingerprint, previous_fingerprint, evaluation_epoch_s,
                published_at_ms, total_tracked, event_count, kessler_risk_index, snapshot_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                cycle.version as i64,
                cycle.fingerprint,
                cycle.previous_fingerprint,
                cycle.snapshot.evaluation_epoch_s,
                cycle.published_at_ms,
                cycle.snapshot.total_tracked as i64,
                cycle.events.len() as i64,
                cycle.snapshot.kessler_risk_index,
                snapshot_json,
            ],
        )?;

        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO cycle_events (
                    version, event_id, primary_id, secondary_id, tca_epoch_s,
                    miss_distance_km, collision_probability, risk_level, event_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for event in &cycle.events {
                insert.execute(params![
                    cycle.version as i64,
                    event.event_id,
                    event.primary_id,
                    event.secondary_id,
                    event.tca_epoch_s,
                    event.miss_distance_km,
                    event.collision_probability,
                    event.risk_level.as_str(),
                    serde_json::to_string(event)?,
                ])?;
            }
        }

        tx.commit()?;

        self.metrics.cycles_appended_total += 1;
        self.metrics.events_appended_total += cycle.events.len() as u64;

        debug!(
            version = cycle.version,
            events = cycle.events.len(),
            fingerprint = %cycle.fingerprint,
            "Cycle appended to history"
        );
        Ok(())
    }

    pub fn latest_version(&self) -> Result<Option<u64>> {
        Ok(self
            .conn
            .query_row("SELECT MAX(version) FROM cycles", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?
            .map(|v| v as u64))
    }

    /// Load a stored cycle with its events in publication order.
    pub fn load(&self, version: u64) -> Result<PublishedCycle> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT fingerprint, previous_fingerprint, published_at_ms, snapshot_json
                FROM cycles WHERE version = ?1
                "#,
                params![version as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => HistoryError::NotFound(version),
                other => HistoryError::Database(other),
            })?;
        let (fingerprint, previous_fingerprint, published_at_ms, snapshot_json) = row;

        Ok(PublishedCycle {
            version,
            published_at_ms,
            fingerprint,
            previous_fingerprint,
            snapshot: serde_json::from_str(&snapshot_json)?,
            events: self.events(version)?,
        })
    }

    /// Most recent stored cycle, if any.
    pub fn latest(&self) -> Result<Option<PublishedCycle>> {
        match self.latest_version()? {
            Some(version) => self.load(version).map(Some),
            None => Ok(None),
        }
    }

    pub fn events(&self, version: u64) -> Result<Vec<ConjunctionEvent>> {
        let mut stmt = self
            .conn
            .prepare("SELECT event_json FROM cycle_events WHERE version = ?1 ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map(params![version as i64], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(HistoryError::from))
            .collect()
    }

    /// Newest-first summaries, at most `limit`.
    pub fn summaries(&self, limit: usize) -> Result<Vec<CycleSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT version, published_at_ms, fingerprint, evaluation_epoch_s,
                   total_tracked, event_count, kessler_risk_index
            FROM cycles
            ORDER BY version DESC
            LIMIT ?1
            "#,
        )?;
        let summaries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(CycleSummary {
                    version: row.get::<_, i64>(0)? as u64,
                    published_at_ms: row.get(1)?,
                    fingerprint: row.get(2)?,
                    evaluation_epoch_s: row.get(3)?,
                    total_tracked: row.get::<_, i64>(4)? as u64,
                    event_count: row.get::<_, i64>(5)? as u64,
                    kessler_risk_index: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Walk every stored cycle and verify version continuity, fingerprint
    /// chaining, snapshot integrity and event counts.
    pub fn startup_continuity_check(&mut self) -> Result<()> {
        self.metrics.startup_checks_total += 1;
        info!("Starting history continuity check");

        let rows: Vec<ChainRow> = {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT c.version, c.fingerprint, c.previous_fingerprint, c.snapshot_json,
                       c.event_count,
                       (SELECT COUNT(*) FROM cycle_events e WHERE e.version = c.version)
                FROM cycles c
                ORDER BY c.version ASC
                "#,
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ChainRow {
                        version: row.get::<_, i64>(0)? as u64,
                        fingerprint: row.get(1)?,
                        previous_fingerprint: row.get(2)?,
                        snapshot_json: row.get(3)?,
                        recorded_events: row.get::<_, i64>(4)? as u64,
                        stored_events: row.get::<_, i64>(5)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let Some(first) = rows.first() else {
            info!("History is empty, continuity check passed");
            return Ok(());
        };

        let mut expected_version = first.version;
        let mut previous = GENESIS_FINGERPRINT.to_string();

        for (i, row) in rows.iter().enumerate() {
            let reason = if row.version != expected_version {
                Some(format!(
                    "Missing cycles: gap between {} and {}",
                    expected_version.saturating_sub(1),
                    row.version
                ))
            } else if row.previous_fingerprint != previous {
                Some(format!(
                    "Chain broken at version {}: expected previous {}, got {}",
                    row.version, previous, row.previous_fingerprint
                ))
            } else if hash_hex(row.snapshot_json.as_bytes()) != row.fingerprint {
                Some(format!("Snapshot of version {} does not match its fingerprint", row.version))
            } else if row.recorded_events != row.stored_events {
                Some(format!("Event rows of version {} are incomplete", row.version))
            } else {
                None
            };

            if let Some(reason) = reason {
                self.health = HistoryHealth::Corrupted {
                    last_good_version: if i > 0 { Some(rows[i - 1].version) } else { None },
                    first_bad_version: row.version,
                    reason: reason.clone(),
                };
                self.metrics.corruption_detections_total += 1;
                error!(version = row.version, reason = %reason, "History corruption detected");
                return Err(HistoryError::Corrupted(reason));
            }

            previous = row.fingerprint.clone();
            expected_version += 1;
        }

        info!(cycles = rows.len(), "History continuity check passed");
        Ok(())
    }

    pub fn health(&self) -> &HistoryHealth {
        &self.health
    }

    pub fn metrics(&self) -> &HistoryMetrics {
        &self.metrics
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(self.conn.path().unwrap_or(""))
    }

    /// Execute raw SQL, bypassing every integrity check.
    ///
    /// Only for tests that simulate on-disk corruption.
    #[doc(hidden)]
    pub fn __test_execute_raw_sql(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }
}
