//! Error types for expectty.

use std::io;
use std::time::Duration;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for session operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The child process could not be started
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: BoxError,
    },

    /// Raw-mode acquisition or restoration on the controlling terminal failed
    #[error("failed to change terminal mode: {0}")]
    TerminalMode(#[source] io::Error),

    /// Writing to the pty failed
    #[error("I/O error on pty: {0}")]
    Io(#[from] io::Error),

    /// Reading from the pty failed
    #[error("error reading from pty: {0}")]
    Read(#[source] io::Error),

    /// No pattern matched before the deadline
    #[error("timeout expecting results after {0:?}")]
    Timeout(Duration),

    /// Pty allocation or control failed
    #[error("pty error: {0}")]
    Pty(#[source] BoxError),

    /// Waiting on the child process failed
    #[error("failed to wait for child process: {0}")]
    Wait(#[source] io::Error),

    /// Terminating the child process failed
    #[error("failed to kill child process: {0}")]
    Kill(#[source] io::Error),

    /// Subscribing to OS signals failed
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),

    /// The operation needs a started session with an open pty
    #[error("session is not running - call start() first")]
    NotRunning,

    /// `start` was called twice
    #[error("session already started")]
    AlreadyStarted,

    /// `start` was called after `close`
    #[error("session is closed")]
    Closed,

    /// A duration string could not be parsed
    #[error("invalid duration '{0}': expected a value ending in 's' or 'ms'")]
    InvalidDuration(String),

    /// A background task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn launch(command: &str, source: impl Into<BoxError>) -> Self {
        Error::Launch {
            command: command.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn pty(source: impl Into<BoxError>) -> Self {
        Error::Pty(source.into())
    }

    /// True when no pattern matched before the deadline.
    ///
    /// A timeout is an expected outcome of `expect`, not a broken session.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// Result type alias using expectty's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguishable() {
        assert!(Error::Timeout(Duration::from_millis(10)).is_timeout());
        assert!(!Error::NotRunning.is_timeout());
        assert!(!Error::Read(io::Error::other("boom")).is_timeout());
    }

    #[test]
    fn test_launch_message_names_command() {
        let err = Error::launch("nope", io::Error::new(io::ErrorKind::NotFound, "missing"));
        let msg = err.to_string();
        assert!(msg.contains("nope"), "got: {msg}");
        assert!(msg.contains("missing"), "got: {msg}");
    }
}
