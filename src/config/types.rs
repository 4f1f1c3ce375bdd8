use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::url::LinkJoin;

/// Hard ceiling on the number of resources considered in one retrieval
pub const DEFAULT_MAX_RETRIEVAL_SIZE: usize = 5000;

/// Retries allowed after the first failed attempt of a single fetch
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

/// Main configuration structure for edgar-getter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Retrieval engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrievalConfig {
    /// Directory every retrieved resource is written into
    pub save_location: PathBuf,

    /// File suffixes (lower-case, without the dot) eligible for download
    pub valid_suffixes: BTreeSet<String>,

    /// Maximum number of discovered links a single retrieval may carry
    pub max_retrieval_size: usize,

    /// Retries after the first failed GET of a resource
    pub max_retry_attempts: u32,

    /// Number of fetches allowed to perform I/O at the same time
    pub max_concurrent_fetches: usize,

    /// Longest wait, in seconds, for a response or for the next chunk of its
    /// body; 0 disables the timeout
    pub fetch_timeout_secs: u64,

    /// How discovered hrefs are joined onto the index page URI
    pub link_join: LinkJoin,
}

impl RetrievalConfig {
    /// Returns the per-fetch timeout, if one is configured
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            save_location: PathBuf::from("/tmp/edgar/"),
            valid_suffixes: ["tgz", "gz", "xls", "xlsx", "doc", "docx"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_retrieval_size: DEFAULT_MAX_RETRIEVAL_SIZE,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            max_concurrent_fetches: 16,
            fetch_timeout_secs: 300,
            link_join: LinkJoin::default(),
        }
    }
}

/// User agent identification configuration
///
/// SEC EDGAR rejects anonymous clients, so a contact address is always sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the client
    pub name: String,

    /// Version of the client
    pub version: String,

    /// Email address for operators of the remote site
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `name/version (contact-email)`
    pub fn header_value(&self) -> String {
        format!("{}/{} ({})", self.name, self.version, self.contact_email)
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "edgar-getter".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite outcome ledger; no ledger is kept when unset
    pub database_path: Option<String>,
}
