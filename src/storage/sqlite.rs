//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::FetchState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{OutcomeRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, source_uri, started_at, finished_at, config_hash, status, \
     discovered, dispatched, succeeded, elapsed_ms, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source_uri: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
        discovered: row.get::<_, i64>(6)? as u64,
        dispatched: row.get::<_, i64>(7)? as u64,
        succeeded: row.get::<_, i64>(8)? as u64,
        elapsed_ms: row.get::<_, Option<i64>>(9)?.map(|ms| ms as u64),
        error_message: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        source_uri: &str,
        started_at: &str,
        config_hash: &str,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (source_uri, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                source_uri,
                started_at,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        discovered: u64,
        dispatched: u64,
        succeeded: u64,
        elapsed_ms: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, discovered = ?3, dispatched = ?4,
             succeeded = ?5, elapsed_ms = ?6 WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                discovered as i64,
                dispatched as i64,
                succeeded as i64,
                elapsed_ms as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
            params![RunStatus::Aborted.to_db_string(), now, error_message, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Outcome Management =====

    fn record_outcome(
        &mut self,
        run_id: i64,
        uri: &str,
        filename: &str,
        state: FetchState,
        bytes_written: u64,
        attempts: u32,
        error_message: Option<&str>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO outcomes (run_id, uri, filename, state, bytes_written, attempts, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                uri,
                filename,
                state.to_db_string(),
                bytes_written as i64,
                attempts,
                error_message
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_outcomes(&self, run_id: i64) -> StorageResult<Vec<OutcomeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, uri, filename, state, bytes_written, attempts, error_message
             FROM outcomes WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, run_id, uri, filename, state, bytes, attempts, error_message)| {
                    let state = FetchState::from_db_string(&state)
                        .ok_or_else(|| StorageError::Corrupt(format!("unknown state '{}'", state)))?;
                    Ok(OutcomeRecord {
                        id,
                        run_id,
                        uri,
                        filename,
                        state,
                        bytes_written: bytes as u64,
                        attempts,
                        error_message,
                    })
                },
            )
            .collect()
    }

    fn count_outcomes_by_state(&self, run_id: i64) -> StorageResult<HashMap<FetchState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM outcomes WHERE run_id = ?1 GROUP BY state")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (state, count) = row?;
            if let Some(state) = FetchState::from_db_string(&state) {
                counts.insert(state, count as u64);
            }
        }

        Ok(counts)
    }

    // ===== Transactions =====

    fn in_transaction(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Storage) -> StorageResult<i64>,
    ) -> StorageResult<i64> {
        self.conn.execute_batch("BEGIN")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}
