/// Fetch state definitions for tracking a single resource download
///
/// A fetch task starts `Pending`, may pass through `Retrying`, and always ends in
/// exactly one terminal state.
use std::fmt;

/// Represents the current state of one fetch task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    // ===== Active States =====
    /// Task has been dispatched but has not touched the network yet
    Pending,

    /// GET attempt `n` (1-based) failed transiently and is being retried
    Retrying(u32),

    // ===== Terminal Success State =====
    /// Resource was downloaded and written completely
    Succeeded,

    // ===== Terminal Skip State =====
    /// Filename suffix is not eligible; no network or disk activity happened
    Filtered,

    // ===== Terminal Error States =====
    /// The local file could not be created
    SinkFailed,

    /// Every GET attempt failed transiently
    RetriesExhausted,

    /// Remote answered with a permanent (4xx) status
    HttpRejected,

    /// Streaming the body into the local file failed
    CopyFailed,

    /// The batch was cancelled before the task finished
    Cancelled,
}

impl FetchState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the task may still change state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Retrying(_))
    }

    /// Returns true if this represents a successful download
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the resource was skipped rather than failed
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Filtered)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::SinkFailed
                | Self::RetriesExhausted
                | Self::HttpRejected
                | Self::CopyFailed
                | Self::Cancelled
        )
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Retrying(1)) => true,
            (Self::Retrying(n), Self::Retrying(m)) => m == n + 1,
            (Self::Pending | Self::Retrying(_), next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Converts the state to its database string representation
    ///
    /// `Retrying` collapses to a single string; the attempt number is stored
    /// separately with the outcome.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying(_) => "retrying",
            Self::Succeeded => "succeeded",
            Self::Filtered => "filtered",
            Self::SinkFailed => "sink_failed",
            Self::RetriesExhausted => "retries_exhausted",
            Self::HttpRejected => "http_rejected",
            Self::CopyFailed => "copy_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "retrying" => Some(Self::Retrying(1)),
            "succeeded" => Some(Self::Succeeded),
            "filtered" => Some(Self::Filtered),
            "sink_failed" => Some(Self::SinkFailed),
            "retries_exhausted" => Some(Self::RetriesExhausted),
            "http_rejected" => Some(Self::HttpRejected),
            "copy_failed" => Some(Self::CopyFailed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns every terminal state
    pub fn terminal_states() -> Vec<Self> {
        vec![
            Self::Succeeded,
            Self::Filtered,
            Self::SinkFailed,
            Self::RetriesExhausted,
            Self::HttpRejected,
            Self::CopyFailed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrying(n) => write!(f, "retrying({})", n),
            other => write!(f, "{}", other.to_db_string()),
        }
    }
}
