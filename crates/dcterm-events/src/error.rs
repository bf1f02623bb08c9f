//! Error types for dispatcher operations.

use thiserror::Error;

use crate::args::ArgKind;

/// Errors that can occur while declaring, emitting or dispatching events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Event was explicitly declared twice (or declared after lazy creation).
    #[error("event already exists: {0}")]
    AlreadyExists(String),

    /// Argument was read as the wrong kind.
    #[error("argument {index} is {found}, not {expected}")]
    TypeMismatch {
        index: usize,
        expected: ArgKind,
        found: ArgKind,
    },

    /// Argument index is past the end of the emission's arguments.
    #[error("argument index {index} out of range ({count} arguments)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Dispatch queue is full and the overflow policy is `Reject`.
    #[error("dispatch queue full (capacity {capacity})")]
    QueueOverflow { capacity: usize },

    /// More positional arguments than an emission can carry.
    #[error("too many arguments: {0} (max {max})", max = crate::args::MAX_ARGS)]
    TooManyArgs(usize),

    /// Numeric priority outside `0..=9`.
    #[error("invalid priority level: {0}")]
    InvalidPriority(u8),

    /// Priority string could not be parsed.
    #[error("invalid priority: {0}")]
    ParsePriority(String),

    /// Another thread is already running the dispatch loop.
    #[error("dispatch loop already running")]
    AlreadyRunning,

    /// The dispatch loop has finished; nothing more will be dispatched.
    #[error("dispatcher closed")]
    Closed,

    /// The dispatch thread could not be started.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(String),

    /// A listener reported a failure of its own.
    #[error("listener failed: {0}")]
    Listener(String),

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl EventError {
    /// Wraps any displayable error raised inside a listener.
    pub fn listener(e: impl std::fmt::Display) -> Self {
        EventError::Listener(e.to_string())
    }
}

/// Result type alias for dispatcher operations.
pub type Result<T> = std::result::Result<T, EventError>;
