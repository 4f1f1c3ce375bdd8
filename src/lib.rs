//! edgar-getter: concurrent retrieval of resources listed on remote index pages
//!
//! This crate discovers downloadable resource links on an index page (or takes a
//! single direct resource URI), fetches every eligible resource concurrently with
//! bounded retry, writes each one to a local directory, and reports the outcome of
//! every fetch together with aggregate timing.

pub mod config;
pub mod output;
pub mod retrieval;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod url;

use thiserror::Error;

/// Main error type for batch-level retrieval failures
///
/// Per-resource failures never surface here; they are carried by
/// [`retrieval::FetchOutcome`] instead.
#[derive(Debug, Error)]
pub enum GetterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery failed for {uri}: {message}")]
    Discovery { uri: String, message: String },

    #[error("Too many resources: found {found}, at most {max} allowed per retrieval")]
    TooManyResources { found: usize, max: usize },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid batch transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::BatchState,
        to: state::BatchState,
    },
}

impl GetterError {
    /// Returns true for the errors that abort a batch before any fetch is dispatched
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Discovery { .. } | Self::TooManyResources { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid suffix in config: {0}")]
    InvalidSuffix(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Cannot resolve '{href}' against '{base}': {message}")]
    Join {
        base: String,
        href: String,
        message: String,
    },
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, GetterError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, RetrievalConfig};
pub use retrieval::{Coordinator, FetchError, FetchOutcome, RetrievalResult};
pub use state::{BatchState, BatchStatus, FetchState};
pub use telemetry::{MemoryTelemetry, Telemetry, TracingTelemetry};
