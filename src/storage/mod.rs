//! Storage module for the retrieval ledger
//!
//! This module keeps an optional history of retrieval runs, including:
//! - SQLite database initialization and schema management
//! - One row per retrieval call with its timing and counts
//! - One row per fetch outcome, so per-link detail survives the call

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::retrieval::RetrievalResult;
use crate::state::{BatchStatus, FetchState};
use crate::GetterError;

use std::path::Path;

/// Opens (creating if needed) a ledger database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, GetterError> {
    Ok(SqliteStorage::new(path)?)
}

/// Represents a retrieval run in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub source_uri: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub discovered: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub elapsed_ms: Option<u64>,
    pub error_message: Option<String>,
}

/// Represents one fetch outcome in the database
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    pub id: i64,
    pub run_id: i64,
    pub uri: String,
    pub filename: String,
    pub state: FetchState,
    pub bytes_written: u64,
    pub attempts: u32,
    pub error_message: Option<String>,
}

/// Status of a retrieval run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

impl From<BatchStatus> for RunStatus {
    fn from(status: BatchStatus) -> Self {
        match status {
            BatchStatus::Completed => Self::Completed,
            BatchStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// Records a finished retrieval: the run row and every outcome, atomically
///
/// # Returns
///
/// The ID of the new run
pub fn record_retrieval(
    storage: &mut dyn Storage,
    result: &RetrievalResult,
    config_hash: &str,
) -> StorageResult<i64> {
    storage.in_transaction(&mut |storage: &mut dyn Storage| {
        let run_id = storage.create_run(
            &result.source_uri,
            &result.started_at.to_rfc3339(),
            config_hash,
        )?;

        for outcome in &result.outcomes {
            storage.record_outcome(
                run_id,
                &outcome.uri,
                &outcome.filename,
                outcome.state,
                outcome.bytes_written,
                outcome.attempts,
                outcome.error.as_ref().map(|e| e.to_string()).as_deref(),
            )?;
        }

        storage.finish_run(
            run_id,
            result.status.into(),
            result.discovered as u64,
            result.dispatched as u64,
            result.files.len() as u64,
            result.elapsed.as_millis() as u64,
        )?;

        Ok(run_id)
    })
}

/// Records a retrieval that was aborted before dispatch
pub fn record_aborted(
    storage: &mut dyn Storage,
    source_uri: &str,
    started_at: &str,
    config_hash: &str,
    error: &GetterError,
) -> StorageResult<i64> {
    let run_id = storage.create_run(source_uri, started_at, config_hash)?;
    storage.fail_run(run_id, &error.to_string())?;
    Ok(run_id)
}
