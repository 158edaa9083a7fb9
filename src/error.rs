use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Errors that can occur in the logging library
#[derive(ThisError, Debug)]
pub enum Error {
    /// A construction parameter was rejected.
    #[error("{arg:?} is not a valid argument: {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        arg: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// The sink was written to or flushed after it was closed.
    #[error("File {path:?} is already closed")]
    ClosedSink {
        /// Path of the closed sink.
        path: PathBuf,
    },
    /// The active log file disappeared before it could be rotated.
    #[error("Log file {path:?} vanished before rotation; sink state is corrupt")]
    RotationCorruption {
        /// Path that was expected to exist.
        path: PathBuf,
    },
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Rendering a timestamp failed.
    #[error("Time error: {0}")]
    Time(String),
    /// Initialization failed.
    #[error("Initialization error: {0}")]
    Init(String),
}

impl Error {
    pub(crate) fn invalid(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}

impl From<time::error::Format> for Error {
    fn from(err: time::error::Format) -> Self {
        Self::Time(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
