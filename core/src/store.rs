//! SQLite persistence for runs and their flagged purchases.
//!
//! RULE: Only store.rs talks to the database.
//! The detector never touches it; a `RunRecorder` sink does.

use crate::{
    config::DetectorConfig,
    detector::RunStats,
    error::DetectorResult,
    event::FlaggedPurchase,
    sink::FlagSink,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub struct FlagStore {
    conn: Connection,
}

impl FlagStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> DetectorResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: readers don't block the writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DetectorResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> DetectorResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_flags.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        config: &DetectorConfig,
        started_at: DateTime<Utc>,
    ) -> DetectorResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, depth_limit, window_size, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                config.depth as i64,
                config.window as i64,
                started_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, stats: &RunStats) -> DetectorResult<()> {
        self.conn.execute(
            "UPDATE run SET finished_at = ?2, stats_json = ?3 WHERE run_id = ?1",
            params![run_id, Utc::now().to_rfc3339(), serde_json::to_string(stats)?],
        )?;
        Ok(())
    }

    pub fn run_stats(&self, run_id: &str) -> DetectorResult<Option<RunStats>> {
        let json: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT stats_json FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        match json.flatten() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    // ── Flagged purchases ──────────────────────────────────────

    pub fn insert_flag(
        &self,
        run_id: &str,
        position: usize,
        flag: &FlaggedPurchase,
    ) -> DetectorResult<()> {
        self.conn.execute(
            "INSERT INTO flagged_purchase
                (run_id, position, user_id, event_timestamp, mean, sd, record_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                position as i64,
                flag.user(),
                flag.field_text("timestamp"),
                flag.mean,
                flag.sd,
                serde_json::to_string(flag)?,
            ],
        )?;
        Ok(())
    }

    /// Flagged purchases of a run, in the order they were emitted.
    pub fn flags_for_run(&self, run_id: &str) -> DetectorResult<Vec<FlaggedPurchase>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_json FROM flagged_purchase
             WHERE run_id = ?1
             ORDER BY position ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut flags = Vec::with_capacity(rows.len());
        for json in &rows {
            flags.push(serde_json::from_str(json)?);
        }
        Ok(flags)
    }

    pub fn flag_count(&self, run_id: &str) -> DetectorResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM flagged_purchase WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn flag_count_for_user(&self, run_id: &str, user_id: &str) -> DetectorResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM flagged_purchase WHERE run_id = ?1 AND user_id = ?2",
            params![run_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// A sink that appends to this run's flagged purchases.
    pub fn recorder<'s>(&'s self, run_id: &str) -> RunRecorder<'s> {
        RunRecorder {
            store: self,
            run_id: run_id.to_string(),
            position: 0,
        }
    }
}

pub struct RunRecorder<'s> {
    store: &'s FlagStore,
    run_id: String,
    position: usize,
}

impl FlagSink for RunRecorder<'_> {
    fn accept(&mut self, flag: &FlaggedPurchase) -> DetectorResult<()> {
        self.store.insert_flag(&self.run_id, self.position, flag)?;
        self.position += 1;
        Ok(())
    }
}
