//! Telemetry sinks for retrieval counters and timings
//!
//! The coordinator and fetch tasks push named signals into a [`Telemetry`]
//! handle injected at construction time. Implementations must tolerate
//! concurrent calls from many tasks.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Counter incremented once per dispatched fetch task
pub const DISPATCHED_COUNTER: &str = "retrieve.dispatched";

/// Wall-clock duration of a whole retrieval call
pub const RETRIEVE_DURATION: &str = "retrieve.duration";

/// Timestamp taken just before discovery starts
pub const RETRIEVE_STARTED_AT: &str = "retrieve.started_at";

/// Counter incremented for every transient GET failure that is retried
pub const RETRY_COUNTER: &str = "fetch.retries";

/// Counter incremented with the bytes written by successful fetches
pub const BYTES_COUNTER: &str = "fetch.bytes";

/// Returns the per-outcome counter name for a terminal fetch state
///
/// # Examples
///
/// ```
/// use edgar_getter::state::FetchState;
/// use edgar_getter::telemetry::outcome_counter;
///
/// assert_eq!(outcome_counter(FetchState::Filtered), "fetch.outcome.filtered");
/// ```
pub fn outcome_counter(state: crate::state::FetchState) -> String {
    format!("fetch.outcome.{}", state.to_db_string())
}

/// A sink for named counters, durations and timestamps
pub trait Telemetry: Send + Sync {
    /// Adds `amount` to the named counter
    fn increment_counter(&self, name: &str, amount: u64);

    /// Records one observation of the named duration
    fn record_duration(&self, name: &str, duration: Duration);

    /// Records a point in time under the given name
    fn record_timestamp(&self, name: &str, at: DateTime<Utc>) {
        let _ = (name, at);
    }
}

/// Discards every signal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn increment_counter(&self, _name: &str, _amount: u64) {}

    fn record_duration(&self, _name: &str, _duration: Duration) {}
}

/// Emits every signal as a `tracing` debug event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn increment_counter(&self, name: &str, amount: u64) {
        tracing::debug!(counter = name, amount, "telemetry counter");
    }

    fn record_duration(&self, name: &str, duration: Duration) {
        tracing::debug!(timer = name, elapsed_ms = duration.as_millis() as u64, "telemetry duration");
    }

    fn record_timestamp(&self, name: &str, at: DateTime<Utc>) {
        tracing::debug!(timestamp = name, at = %at.to_rfc3339(), "telemetry timestamp");
    }
}

/// Keeps aggregated signals in memory
///
/// Counters are summed, durations are kept as individual observations and only
/// the latest timestamp per name is retained.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    counters: Mutex<HashMap<String, u64>>,
    durations: Mutex<HashMap<String, Vec<Duration>>>,
    timestamps: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter; zero if it was never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// All observations recorded for a duration, in recording order
    pub fn durations(&self, name: &str) -> Vec<Duration> {
        self.durations
            .lock()
            .map(|d| d.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Sum of all observations recorded for a duration
    pub fn total_duration(&self, name: &str) -> Duration {
        self.durations(name).into_iter().sum()
    }

    /// Latest timestamp recorded under `name`
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.timestamps.lock().ok().and_then(|t| t.get(name).copied())
    }

    /// Snapshot of every counter
    pub fn counters(&self) -> HashMap<String, u64> {
        self.counters.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Telemetry for MemoryTelemetry {
    fn increment_counter(&self, name: &str, amount: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name.to_string()).or_insert(0) += amount;
        }
    }

    fn record_duration(&self, name: &str, duration: Duration) {
        if let Ok(mut durations) = self.durations.lock() {
            durations.entry(name.to_string()).or_default().push(duration);
        }
    }

    fn record_timestamp(&self, name: &str, at: DateTime<Utc>) {
        if let Ok(mut timestamps) = self.timestamps.lock() {
            timestamps.insert(name.to_string(), at);
        }
    }
}
