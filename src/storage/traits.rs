//! Storage traits and error types
//!
//! This module defines the trait interface for ledger backends and
//! associated error types.

use crate::state::FetchState;
use crate::storage::{OutcomeRecord, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for ledger backend implementations
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `source_uri` - The URI the retrieval was started with
    /// * `started_at` - RFC 3339 start timestamp
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(
        &mut self,
        source_uri: &str,
        started_at: &str,
        config_hash: &str,
    ) -> StorageResult<i64>;

    /// Marks a run as finished with its final counts
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        discovered: u64,
        dispatched: u64,
        succeeded: u64,
        elapsed_ms: u64,
    ) -> StorageResult<()>;

    /// Marks a run as aborted with the batch error that ended it
    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Lists the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Outcome Management =====

    /// Records one fetch outcome for a run
    #[allow(clippy::too_many_arguments)]
    fn record_outcome(
        &mut self,
        run_id: i64,
        uri: &str,
        filename: &str,
        state: FetchState,
        bytes_written: u64,
        attempts: u32,
        error_message: Option<&str>,
    ) -> StorageResult<i64>;

    /// Lists the outcomes of a run in the order they were recorded
    fn list_outcomes(&self, run_id: i64) -> StorageResult<Vec<OutcomeRecord>>;

    /// Counts the outcomes of a run per terminal state
    fn count_outcomes_by_state(&self, run_id: i64) -> StorageResult<HashMap<FetchState, u64>>;

    // ===== Transactions =====

    /// Runs `f` atomically: all of its writes are kept or none are
    fn in_transaction(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Storage) -> StorageResult<i64>,
    ) -> StorageResult<i64>;
}
