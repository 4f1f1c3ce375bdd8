//! State module for tracking retrieval progress
//!
//! # Components
//!
//! - `FetchState`: Tracks one fetch task (pending, retrying, succeeded, filtered, ...)
//! - `BatchState`: Tracks one retrieval call from discovery to completion
//! - `BatchStatus`: How a retrieval that returned a result ended

mod batch_state;
mod fetch_state;

// Re-export main types
pub use batch_state::{BatchState, BatchStatus};
pub use fetch_state::FetchState;
