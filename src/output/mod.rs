//! Output module for retrieval reports
//!
//! This module handles:
//! - Summarizing the outcomes of a retrieval call
//! - Printing a finished retrieval to stdout
//! - Printing the run history kept in the ledger

pub mod stats;

pub use stats::{print_outcome_summary, OutcomeSummary};

use crate::retrieval::RetrievalResult;
use crate::storage::{Storage, StorageResult};

/// Number of runs shown by [`print_run_history`]
pub const HISTORY_LENGTH: usize = 20;

/// Prints a finished retrieval to stdout
pub fn print_summary(result: &RetrievalResult) {
    println!("=== Retrieval Summary ===\n");

    println!("Source: {}", result.source_uri);
    println!("Status: {}", result.status);
    println!("Started: {}", result.started_at.to_rfc3339());
    println!("Elapsed: {:.3}s", result.elapsed.as_secs_f64());
    println!("Links discovered: {}", result.discovered);
    println!("Fetches dispatched: {}", result.dispatched);
    println!();

    let summary = OutcomeSummary::from_outcomes(&result.outcomes);
    print_outcome_summary(&summary);

    if !result.files.is_empty() {
        println!("\nFiles ({}):", result.files.len());
        for file in &result.files {
            println!("  - {}", file);
        }
    }

    let failures: Vec<_> = result
        .unsuccessful()
        .filter_map(|o| o.error.as_ref())
        .collect();
    if !failures.is_empty() {
        println!("\nNot retrieved ({}):", failures.len());
        for error in failures {
            println!("  - {}", error);
        }
    }
}

/// Prints the most recent runs recorded in the ledger, newest first
pub fn print_run_history(storage: &dyn Storage) -> StorageResult<()> {
    let runs = storage.list_runs(HISTORY_LENGTH)?;

    println!("=== Retrieval History ===\n");

    if runs.is_empty() {
        println!("No runs recorded");
        return Ok(());
    }

    for run in runs {
        println!(
            "#{} [{}] {} (started {})",
            run.id,
            run.status.to_db_string(),
            run.source_uri,
            run.started_at
        );

        if let Some(error) = &run.error_message {
            println!("  Error: {}", error);
            continue;
        }

        let elapsed = run
            .elapsed_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  Discovered: {}, dispatched: {}, succeeded: {}, elapsed: {}",
            run.discovered, run.dispatched, run.succeeded, elapsed
        );

        let summary = OutcomeSummary::load(storage, run.id)?;
        for (state, count) in summary.sorted_states() {
            println!("    {}: {}", state, count);
        }
    }

    Ok(())
}
