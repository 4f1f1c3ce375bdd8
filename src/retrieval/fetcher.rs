//! Single resource fetcher
//!
//! This module downloads one URI into one file under the save location:
//! - Filtering by filename suffix before any I/O
//! - Creating a task-private partial file (never retried)
//! - GET with bounded retry on transient failures
//! - Streaming the body to disk while counting bytes
//! - Renaming the partial file onto its final name once complete

use crate::config::{RetrievalConfig, UserAgentConfig};
use crate::retrieval::filter::SuffixFilter;
use crate::state::FetchState;
use crate::telemetry::{Telemetry, RETRY_COUNTER};
use crate::url::last_segment;
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Errors that end a single fetch without a downloaded file
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("File {filename} not allowed")]
    Filtered { filename: String },

    #[error("Failed to create {}: {source}", .path.display())]
    SinkCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Giving up on {uri} after {attempts} attempts: {last_error}")]
    RetryExhausted {
        uri: String,
        attempts: u32,
        last_error: String,
    },

    #[error("{uri} answered HTTP {status}")]
    HttpStatus { uri: String, status: u16 },

    #[error("Failed to copy body of {uri}: {message}")]
    Copy { uri: String, message: String },

    #[error("Fetch of {uri} was cancelled")]
    Cancelled { uri: String },
}

/// Result of one fetch task
///
/// Produced exactly once per dispatched link and never modified afterwards.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The URI that was fetched
    pub uri: String,

    /// Last path segment of the URI, used as the local filename
    pub filename: String,

    /// Terminal state of the task
    pub state: FetchState,

    /// Bytes written to disk; zero unless the fetch succeeded
    pub bytes_written: u64,

    /// GET attempts made (0 when filtered or the file could not be created)
    pub attempts: u32,

    /// Why the fetch did not succeed
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    fn succeeded_with(uri: &str, filename: String, bytes_written: u64, attempts: u32) -> Self {
        Self {
            uri: uri.to_string(),
            filename,
            state: FetchState::Succeeded,
            bytes_written,
            attempts,
            error: None,
        }
    }

    fn failed(uri: &str, filename: String, state: FetchState, attempts: u32, error: FetchError) -> Self {
        Self {
            uri: uri.to_string(),
            filename,
            state,
            bytes_written: 0,
            attempts,
            error: Some(error),
        }
    }

    /// Outcome for a task that was cancelled before it could finish
    pub fn cancelled(uri: &str) -> Self {
        Self::failed(
            uri,
            last_segment(uri).to_string(),
            FetchState::Cancelled,
            0,
            FetchError::Cancelled {
                uri: uri.to_string(),
            },
        )
    }

    /// Returns true if the resource was written completely
    pub fn succeeded(&self) -> bool {
        self.state.is_success()
    }
}

/// Builds the HTTP client shared by discovery and all fetch tasks
///
/// Automatic content decoding stays off so response bodies are written to disk
/// byte for byte. The client carries no overall request timeout: the per-fetch
/// timeout is applied by the callers, so a large transfer that keeps making
/// progress is never cut off.
pub fn build_http_client(user_agent: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// A GET that did not produce a usable response
struct AttemptFailure {
    state: FetchState,
    attempts: u32,
    error: FetchError,
}

/// A download in progress under a name only its own task uses
///
/// Dropping it without [`commit`](Self::commit) removes the partial file, so a
/// failed or cancelled task never touches the file another task published
/// under the same final name.
struct PartialFile {
    part: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(save_location: &Path, filename: &str, id: u64) -> Self {
        let part_name = format!(".{}.{}-{}.part", filename, std::process::id(), id);
        Self {
            part: save_location.join(part_name),
            target: save_location.join(filename),
            committed: false,
        }
    }

    /// Moves the finished download onto its final name
    async fn commit(mut self) -> std::io::Result<()> {
        tokio::fs::rename(&self.part, &self.target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.part) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("Could not remove {}: {}", self.part.display(), e);
            }
        }
    }
}

/// Downloads individual resources into the save location
pub struct ResourceFetcher {
    client: Client,
    save_location: PathBuf,
    filter: SuffixFilter,
    max_retry_attempts: u32,
    fetch_timeout: Option<Duration>,
    next_part_id: AtomicU64,
    telemetry: Arc<dyn Telemetry>,
}

impl ResourceFetcher {
    pub fn new(client: Client, config: &RetrievalConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            client,
            save_location: config.save_location.clone(),
            filter: SuffixFilter::from_config(config),
            max_retry_attempts: config.max_retry_attempts,
            fetch_timeout: config.fetch_timeout(),
            next_part_id: AtomicU64::new(0),
            telemetry,
        }
    }

    /// Fetches `uri` into `save_location/<last segment of uri>`
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Suffix not allowed | Immediate → Filtered, no I/O |
    /// | File creation fails | Immediate → SinkFailed |
    /// | HTTP 4xx | Immediate → HttpRejected |
    /// | HTTP 5xx / transport error / timeout | Retry up to `max-retry-attempts` times, no delay |
    /// | Retries used up | → RetriesExhausted |
    /// | Body copy fails or stalls | Immediate → CopyFailed |
    ///
    /// The body is written to a partial file private to this call and only
    /// renamed onto the final name once complete. The fetch timeout bounds the
    /// wait for the response and each wait for the next body chunk, not the
    /// whole transfer.
    pub async fn fetch(&self, uri: &str) -> FetchOutcome {
        let filename = last_segment(uri).to_string();

        if !self.filter.is_downloadable(&filename) {
            tracing::info!("File {} not allowed", filename);
            let error = FetchError::Filtered {
                filename: filename.clone(),
            };
            return FetchOutcome::failed(uri, filename, FetchState::Filtered, 0, error);
        }

        tracing::info!("Downloading {} to {}", uri, filename);

        let id = self.next_part_id.fetch_add(1, Ordering::Relaxed);
        let partial = PartialFile::new(&self.save_location, &filename, id);
        let mut file = match File::create(&partial.part).await {
            Ok(file) => file,
            Err(source) => {
                tracing::warn!("Error while creating {}: {}", partial.part.display(), source);
                let error = FetchError::SinkCreation {
                    path: partial.target.clone(),
                    source,
                };
                return FetchOutcome::failed(uri, filename, FetchState::SinkFailed, 0, error);
            }
        };

        let (response, attempts) = match self.get_with_retry(uri).await {
            Ok(ok) => ok,
            Err(failure) => {
                return FetchOutcome::failed(
                    uri,
                    filename,
                    failure.state,
                    failure.attempts,
                    failure.error,
                );
            }
        };

        let copied = copy_body(response, &mut file, self.fetch_timeout).await;
        drop(file);

        let result = match copied {
            Ok(bytes) => partial
                .commit()
                .await
                .map(|()| bytes)
                .map_err(|e| format!("failed to move download into place: {}", e)),
            Err(message) => Err(message),
        };

        match result {
            Ok(bytes) => {
                tracing::info!("File {} of {} bytes downloaded from {}", filename, bytes, uri);
                FetchOutcome::succeeded_with(uri, filename, bytes, attempts)
            }
            Err(message) => {
                tracing::warn!("Error while copying file {}: {}", uri, message);
                let error = FetchError::Copy {
                    uri: uri.to_string(),
                    message,
                };
                FetchOutcome::failed(uri, filename, FetchState::CopyFailed, attempts, error)
            }
        }
    }

    /// Issues the GET, retrying transient failures
    ///
    /// Returns the successful response together with the number of attempts
    /// it took. Exhaustion is always reported as a failure carrying the last
    /// error seen.
    async fn get_with_retry(&self, uri: &str) -> Result<(Response, u32), AttemptFailure> {
        let max_attempts = self.max_retry_attempts.saturating_add(1);
        let mut state = FetchState::Pending;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let last_error = match self.send(uri).await {
                Ok(response) if response.status().is_success() => {
                    return Ok((response, attempt));
                }
                Ok(response) if response.status().is_client_error() => {
                    let status = response.status().as_u16();
                    tracing::warn!("{} answered HTTP {}, not retrying", uri, status);
                    return Err(AttemptFailure {
                        state: FetchState::HttpRejected,
                        attempts: attempt,
                        error: FetchError::HttpStatus {
                            uri: uri.to_string(),
                            status,
                        },
                    });
                }
                Ok(response) => format!("HTTP {}", response.status()),
                Err(message) => message,
            };

            tracing::warn!("Error while downloading {}: {}", uri, last_error);

            if attempt >= max_attempts {
                return Err(AttemptFailure {
                    state: FetchState::RetriesExhausted,
                    attempts: attempt,
                    error: FetchError::RetryExhausted {
                        uri: uri.to_string(),
                        attempts: attempt,
                        last_error,
                    },
                });
            }

            let next = FetchState::Retrying(attempt);
            debug_assert!(state.can_transition_to(next));
            state = next;
            tracing::debug!("Retrying {} ({})", uri, state);
            self.telemetry.increment_counter(RETRY_COUNTER, 1);
        }
    }

    /// One GET, bounded by the fetch timeout until the response headers arrive
    async fn send(&self, uri: &str) -> Result<Response, String> {
        let request = self.client.get(uri).send();
        match self.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(sent) => sent.map_err(|e| e.to_string()),
                Err(_) => Err(format!("no response within {:?}", limit)),
            },
            None => request.await.map_err(|e| e.to_string()),
        }
    }
}

/// Streams the response body into `file`, returning the bytes written
///
/// With `idle_timeout` set, the copy fails once no chunk arrives for that long.
async fn copy_body(
    mut response: Response,
    file: &mut File,
    idle_timeout: Option<Duration>,
) -> Result<u64, String> {
    let mut written = 0u64;

    loop {
        let next = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, response.chunk())
                .await
                .map_err(|_| format!("no data received for {:?}", limit))?,
            None => response.chunk().await,
        };
        let Some(chunk) = next.map_err(|e| e.to_string())? else {
            break;
        };
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| e.to_string())?;
    Ok(written)
}
