//! Configuration module for edgar-getter
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so an empty file is a valid configuration.
//!
//! # Example
//!
//! ```no_run
//! use edgar_getter::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("getter.toml")).unwrap();
//! println!("Saving into: {}", config.retrieval.save_location.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, OutputConfig, RetrievalConfig, UserAgentConfig, DEFAULT_MAX_RETRIEVAL_SIZE,
    DEFAULT_MAX_RETRY_ATTEMPTS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
