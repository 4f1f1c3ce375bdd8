//! Retrieval coordinator - batch orchestration logic
//!
//! This module contains the fan-out that drives one retrieval call:
//! - Discovering links before anything is dispatched
//! - Applying the fetch-count limit
//! - Spawning one task per link, bounded by a semaphore
//! - Collecting outcomes through a single channel in arrival order
//! - Joining every task before returning, even when cancelled

use crate::config::Config;
use crate::retrieval::discover::LinkDiscoverer;
use crate::retrieval::fetcher::{build_http_client, FetchOutcome, ResourceFetcher};
use crate::state::{BatchState, BatchStatus, FetchState};
use crate::telemetry::{
    outcome_counter, Telemetry, TracingTelemetry, BYTES_COUNTER, DISPATCHED_COUNTER,
    RETRIEVE_DURATION, RETRIEVE_STARTED_AT,
};
use crate::GetterError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything one retrieval call produced
#[derive(Debug)]
pub struct RetrievalResult {
    /// The source URI the call was made with
    pub source_uri: String,

    /// Filenames of successful fetches, in the order their outcomes arrived
    pub files: Vec<String>,

    /// Every outcome, successful or not, in arrival order
    pub outcomes: Vec<FetchOutcome>,

    /// Number of links discovery produced
    pub discovered: usize,

    /// Number of fetch tasks actually spawned
    pub dispatched: usize,

    /// Whether the batch ran to completion or was cancelled
    pub status: BatchStatus,

    /// Wall-clock time the call started, before discovery
    pub started_at: DateTime<Utc>,

    /// Time from the start of discovery until the last task finished
    pub elapsed: Duration,
}

impl RetrievalResult {
    /// Returns true if the caller cancelled the batch
    pub fn is_cancelled(&self) -> bool {
        self.status == BatchStatus::Cancelled
    }

    /// Outcomes that did not succeed
    pub fn unsuccessful(&self) -> impl Iterator<Item = &FetchOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// Tracks the batch lifecycle and rejects illegal transitions
struct BatchTracker {
    state: BatchState,
}

impl BatchTracker {
    fn new() -> Self {
        Self {
            state: BatchState::Idle,
        }
    }

    fn advance(&mut self, next: BatchState) -> Result<(), GetterError> {
        if !self.state.can_transition_to(next) {
            return Err(GetterError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Batch {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Main retrieval coordinator
///
/// Holds only immutable configuration, the shared HTTP client and the telemetry
/// handle; no state is carried from one retrieval call to the next, so a single
/// coordinator may run several retrievals at once.
pub struct Coordinator {
    config: Arc<Config>,
    client: Client,
    fetcher: Arc<ResourceFetcher>,
    telemetry: Arc<dyn Telemetry>,
}

impl Coordinator {
    /// Creates a coordinator that reports telemetry through `tracing`
    pub fn new(config: Config) -> Result<Self, GetterError> {
        Self::with_telemetry(config, Arc::new(TracingTelemetry))
    }

    /// Creates a coordinator that reports telemetry into the given sink
    pub fn with_telemetry(
        config: Config,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self, GetterError> {
        crate::config::validate(&config)?;

        let client = build_http_client(&config.user_agent)?;
        let fetcher = Arc::new(ResourceFetcher::new(
            client.clone(),
            &config.retrieval,
            Arc::clone(&telemetry),
        ));

        Ok(Self {
            config: Arc::new(config),
            client,
            fetcher,
            telemetry,
        })
    }

    /// The configuration this coordinator was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Retrieves every eligible resource reachable from `source_uri`
    ///
    /// `limit == 0` dispatches every discovered link; otherwise only the first
    /// `limit` links in discovery order are dispatched.
    ///
    /// # Errors
    ///
    /// Only batch-fatal conditions are errors (`Discovery`, `TooManyResources`).
    /// Individual fetch failures are reported in [`RetrievalResult::outcomes`].
    pub async fn retrieve(
        &self,
        source_uri: &str,
        limit: usize,
    ) -> Result<RetrievalResult, GetterError> {
        self.retrieve_with_cancel(source_uri, limit, CancellationToken::new())
            .await
    }

    /// Same as [`retrieve`](Self::retrieve), stoppable through `cancel`
    ///
    /// Once `cancel` fires no further links are dispatched and in-flight fetches
    /// resolve to `Cancelled` outcomes. The call still waits for every spawned
    /// task and returns the partial result with [`BatchStatus::Cancelled`].
    pub async fn retrieve_with_cancel(
        &self,
        source_uri: &str,
        limit: usize,
        cancel: CancellationToken,
    ) -> Result<RetrievalResult, GetterError> {
        let mut batch = BatchTracker::new();

        let started_at = Utc::now();
        let start = Instant::now();
        self.telemetry.record_timestamp(RETRIEVE_STARTED_AT, started_at);

        batch.advance(BatchState::Discovering)?;
        let discoverer = LinkDiscoverer::new(&self.client, &self.config.retrieval);
        let links = match discoverer.discover(source_uri).await {
            Ok(links) => links,
            Err(e) => {
                batch.advance(BatchState::Aborted)?;
                tracing::error!("Retrieval from {} aborted: {}", source_uri, e);
                return Err(e);
            }
        };

        let discovered = links.len();
        let selected: Vec<String> = if limit == 0 {
            links
        } else {
            links.into_iter().take(limit).collect()
        };

        batch.advance(BatchState::Dispatching)?;
        let semaphore = Arc::new(Semaphore::new(
            self.config.retrieval.max_concurrent_fetches,
        ));
        let (tx, mut rx) = mpsc::channel::<FetchOutcome>(selected.len().max(1));
        let mut tasks = JoinSet::new();
        let mut dispatched = 0usize;
        let selected_count = selected.len();

        for uri in selected {
            if cancel.is_cancelled() {
                tracing::info!(
                    "Cancellation requested, {} links left undispatched",
                    selected_count - dispatched
                );
                break;
            }

            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let telemetry = Arc::clone(&self.telemetry);
            let cancel = cancel.clone();
            let tx = tx.clone();

            tasks.spawn(async move {
                telemetry.increment_counter(DISPATCHED_COUNTER, 1);

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => FetchOutcome::cancelled(&uri),
                    outcome = fetch_with_permit(&fetcher, &semaphore, &uri) => outcome,
                };

                record_outcome(telemetry.as_ref(), &outcome);
                // Receiver lives until every sender is gone
                let _ = tx.send(outcome).await;
            });
            dispatched += 1;
        }
        drop(tx);

        batch.advance(BatchState::AwaitingCompletion)?;
        tracing::debug!("Dispatched {} fetch tasks", dispatched);

        let mut files = Vec::new();
        let mut outcomes = Vec::with_capacity(dispatched);
        while let Some(outcome) = rx.recv().await {
            if outcome.succeeded() {
                files.push(outcome.filename.clone());
            }
            outcomes.push(outcome);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Fetch task ended without an outcome: {}", e);
            }
        }

        let elapsed = start.elapsed();
        self.telemetry.record_duration(RETRIEVE_DURATION, elapsed);

        let status = batch_status(selected_count, dispatched, &outcomes);
        match status {
            BatchStatus::Cancelled => batch.advance(BatchState::Cancelled)?,
            BatchStatus::Completed => batch.advance(BatchState::Done)?,
        }

        tracing::info!(
            "Retrieval {}: {} of {} dispatched fetches succeeded in {:?}",
            status,
            files.len(),
            dispatched,
            elapsed
        );

        Ok(RetrievalResult {
            source_uri: source_uri.to_string(),
            files,
            outcomes,
            discovered,
            dispatched,
            status,
            started_at,
            elapsed,
        })
    }
}

/// Waits for a concurrency slot, then fetches
async fn fetch_with_permit(
    fetcher: &ResourceFetcher,
    semaphore: &Semaphore,
    uri: &str,
) -> FetchOutcome {
    // The semaphore is never closed while tasks hold a reference to it
    let Ok(_permit) = semaphore.acquire().await else {
        return FetchOutcome::cancelled(uri);
    };
    fetcher.fetch(uri).await
}

/// A batch counts as cancelled only if cancellation cost it work: links left
/// undispatched or fetches cut short
fn batch_status(selected: usize, dispatched: usize, outcomes: &[FetchOutcome]) -> BatchStatus {
    let interrupted = outcomes.iter().any(|o| o.state == FetchState::Cancelled);
    if dispatched < selected || interrupted {
        BatchStatus::Cancelled
    } else {
        BatchStatus::Completed
    }
}

fn record_outcome(telemetry: &dyn Telemetry, outcome: &FetchOutcome) {
    telemetry.increment_counter(&outcome_counter(outcome.state), 1);

    if outcome.succeeded() {
        telemetry.increment_counter(BYTES_COUNTER, outcome.bytes_written);
    } else if let Some(error) = &outcome.error {
        if outcome.state.is_error() {
            tracing::warn!("{} ({})", error, outcome.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemoryTelemetry;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.retrieval.save_location = dir.path().to_path_buf();
        config.retrieval.max_retry_attempts = 1;
        config
    }

    #[test]
    fn test_batch_tracker_rejects_skipping_discovery() {
        let mut tracker = BatchTracker::new();
        let result = tracker.advance(BatchState::Dispatching);
        assert!(matches!(
            result,
            Err(GetterError::InvalidTransition {
                from: BatchState::Idle,
                to: BatchState::Dispatching
            })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.retrieval.max_concurrent_fetches = 0;
        assert!(matches!(
            Coordinator::new(config),
            Err(GetterError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_single_resource_retrieval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/path/file.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("archive"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let telemetry = Arc::new(MemoryTelemetry::new());
        let coordinator =
            Coordinator::with_telemetry(create_test_config(&dir), telemetry.clone()).unwrap();

        let result = coordinator
            .retrieve(&format!("{}/path/file.tar.gz", server.uri()), 0)
            .await
            .unwrap();

        assert_eq!(result.files, vec!["file.tar.gz".to_string()]);
        assert_eq!(result.status, BatchStatus::Completed);
        assert_eq!(result.discovered, 1);
        assert_eq!(result.dispatched, 1);
        assert_eq!(telemetry.counter(DISPATCHED_COUNTER), 1);
        assert_eq!(telemetry.durations(RETRIEVE_DURATION).len(), 1);
        assert!(telemetry.timestamp(RETRIEVE_STARTED_AT).is_some());
    }

    #[tokio::test]
    async fn test_discovery_failure_dispatches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let telemetry = Arc::new(MemoryTelemetry::new());
        let coordinator =
            Coordinator::with_telemetry(create_test_config(&dir), telemetry.clone()).unwrap();

        let result = coordinator
            .retrieve(&format!("{}/feed/", server.uri()), 0)
            .await;

        assert!(matches!(result, Err(GetterError::Discovery { .. })));
        assert_eq!(telemetry.counter(DISPATCHED_COUNTER), 0);
    }

    #[test]
    fn test_batch_status_from_what_happened() {
        let done = vec![FetchOutcome {
            uri: "https://host/a.gz".to_string(),
            filename: "a.gz".to_string(),
            state: FetchState::Succeeded,
            bytes_written: 1,
            attempts: 1,
            error: None,
        }];
        assert_eq!(batch_status(1, 1, &done), BatchStatus::Completed);
        assert_eq!(batch_status(0, 0, &[]), BatchStatus::Completed);
        assert_eq!(batch_status(2, 1, &done), BatchStatus::Cancelled);

        let cut_short = vec![FetchOutcome::cancelled("https://host/a.gz")];
        assert_eq!(batch_status(1, 1, &cut_short), BatchStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_that_costs_nothing_keeps_batch_completed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<table></table>"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator
            .retrieve_with_cancel(&format!("{}/feed/", server.uri()), 0, cancel)
            .await
            .unwrap();

        assert_eq!(result.discovered, 0);
        assert_eq!(result.status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_pre_cancelled_batch_dispatches_nothing() {
        let dir = TempDir::new().unwrap();
        let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator
            .retrieve_with_cancel("http://127.0.0.1:9/a.gz", 0, cancel)
            .await
            .unwrap();

        assert!(result.is_cancelled());
        assert_eq!(result.discovered, 1);
        assert_eq!(result.dispatched, 0);
        assert!(result.files.is_empty());
        assert!(result.outcomes.is_empty());
    }
}
