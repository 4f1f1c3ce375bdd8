use std::fmt;

/// Lifecycle of a single retrieval call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchState {
    Idle,
    Discovering,
    Dispatching,
    AwaitingCompletion,
    Done,
    /// Discovery failed or the ceiling was exceeded; nothing was dispatched
    Aborted,
    /// The caller cancelled after dispatch began
    Cancelled,
}

impl BatchState {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: BatchState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Discovering)
                | (Self::Discovering, Self::Dispatching)
                | (Self::Discovering, Self::Aborted)
                | (Self::Dispatching, Self::AwaitingCompletion)
                | (Self::Dispatching, Self::Cancelled)
                | (Self::AwaitingCompletion, Self::Done)
                | (Self::AwaitingCompletion, Self::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Dispatching => "dispatching",
            Self::AwaitingCompletion => "awaiting_completion",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a retrieval that produced a result ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    /// Every dispatched fetch ran to its natural end
    Completed,
    /// Cancellation was requested; the result is partial
    Cancelled,
}

impl BatchStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
