//! Outcome statistics
//!
//! This module condenses fetch outcomes, live or from the ledger, into
//! per-state counts for display.

use crate::retrieval::FetchOutcome;
use crate::state::FetchState;
use crate::storage::{Storage, StorageResult};
use std::collections::HashMap;

/// Counts of fetch outcomes by terminal state
#[derive(Debug, Clone, Default)]
pub struct OutcomeSummary {
    /// Total number of outcomes
    pub total: u64,

    /// Count of outcomes by state
    pub by_state: HashMap<FetchState, u64>,

    /// Bytes written by successful fetches
    pub bytes_written: u64,
}

impl OutcomeSummary {
    /// Summarizes outcomes produced by a retrieval call
    pub fn from_outcomes(outcomes: &[FetchOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.total += 1;
            *summary.by_state.entry(outcome.state).or_insert(0) += 1;
            if outcome.succeeded() {
                summary.bytes_written += outcome.bytes_written;
            }
        }
        summary
    }

    /// Summarizes the outcomes recorded for a run in the ledger
    pub fn load(storage: &dyn Storage, run_id: i64) -> StorageResult<Self> {
        let outcomes = storage.list_outcomes(run_id)?;
        let mut summary = Self::default();
        for outcome in &outcomes {
            summary.total += 1;
            *summary.by_state.entry(outcome.state).or_insert(0) += 1;
            if outcome.state.is_success() {
                summary.bytes_written += outcome.bytes_written;
            }
        }
        Ok(summary)
    }

    /// Number of outcomes in `state`
    pub fn count(&self, state: FetchState) -> u64 {
        self.by_state.get(&state).copied().unwrap_or(0)
    }

    /// Number of successful fetches
    pub fn succeeded(&self) -> u64 {
        self.count(FetchState::Succeeded)
    }

    /// Number of outcomes in an error state
    pub fn failed(&self) -> u64 {
        self.by_state
            .iter()
            .filter(|(state, _)| state.is_error())
            .map(|(_, count)| count)
            .sum()
    }

    /// Percentage of outcomes that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.succeeded() as f64 / self.total as f64) * 100.0
        }
    }

    /// States with at least one outcome, most frequent first
    pub fn sorted_states(&self) -> Vec<(FetchState, u64)> {
        let mut states: Vec<_> = self.by_state.iter().map(|(s, c)| (*s, *c)).collect();
        states.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_db_string().cmp(b.0.to_db_string())));
        states
    }
}

/// Prints an outcome summary to stdout in a formatted manner
pub fn print_outcome_summary(summary: &OutcomeSummary) {
    println!("Outcomes by State:");
    for (state, count) in summary.sorted_states() {
        let percentage = if summary.total > 0 {
            (count as f64 / summary.total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} fetches, {} bytes written)",
        summary.success_rate(),
        summary.succeeded(),
        summary.total,
        summary.bytes_written
    );
}
