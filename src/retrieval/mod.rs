//! Retrieval module for resource discovery and download
//!
//! This module contains the core retrieval engine, including:
//! - Suffix filtering of candidate filenames
//! - Index page parsing and link discovery
//! - Single resource fetching with bounded retry
//! - Concurrent fan-out and outcome aggregation

mod coordinator;
mod discover;
mod fetcher;
mod filter;
mod parser;

pub use coordinator::{Coordinator, RetrievalResult};
pub use discover::{DiscoveryMode, LinkDiscoverer};
pub use fetcher::{build_http_client, FetchError, FetchOutcome, ResourceFetcher};
pub use filter::SuffixFilter;
pub use parser::{extract_table_links, CandidateLink, ParseError};

use crate::config::Config;
use crate::GetterError;

/// Runs a complete retrieval with a throwaway coordinator
///
/// This is the simplest entry point. It will:
/// 1. Validate the configuration and build the HTTP client
/// 2. Discover links from `source_uri`
/// 3. Fetch the first `limit` links concurrently (all of them when `limit` is 0)
/// 4. Return the filenames that were written, with every outcome
///
/// # Example
///
/// ```no_run
/// use edgar_getter::config::Config;
/// use edgar_getter::retrieval::retrieve;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let result = retrieve(
///     Config::default(),
///     "https://www.sec.gov/Archives/edgar/Feed/2013/QTR1/",
///     1,
/// )
/// .await?;
/// println!("Downloaded {:?}", result.files);
/// # Ok(())
/// # }
/// ```
pub async fn retrieve(
    config: Config,
    source_uri: &str,
    limit: usize,
) -> Result<RetrievalResult, GetterError> {
    Coordinator::new(config)?.retrieve(source_uri, limit).await
}
