//! Error types for the terminal front end.

use thiserror::Error;

use dcterm_events::EventError;

/// Errors that can occur while running the front end.
#[derive(Error, Debug)]
pub enum AppError {
    /// Dispatcher refused or failed an operation.
    #[error("event error: {0}")]
    Events(#[from] EventError),

    /// Terminal or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A producer thread could not be started or panicked.
    #[error("thread error: {0}")]
    Thread(String),
}

/// Result type alias for front-end operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_error_converts() {
        let err: AppError = EventError::Closed.into();
        assert!(matches!(err, AppError::Events(EventError::Closed)));
        assert_eq!(err.to_string(), "event error: dispatcher closed");
    }
}
