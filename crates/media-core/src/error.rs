//! Error types for the media core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for media core operations
pub type Result<T> = std::result::Result<T, MediaError>;

/// Errors raised by the media core.
///
/// Most data-path operations report failure with a plain `bool` or `Option`
/// and a log line; this type covers setup, registration and the lock
/// expiry path where a caller needs to know what went wrong.
#[derive(Error, Debug)]
pub enum MediaError {
    /// A format definition was missing a required field
    #[error("Invalid format definition: {details}")]
    InvalidFormat {
        /// What was wrong with the definition
        details: String,
    },

    /// A format name is already registered with a different definition
    #[error("Format '{name}' is already registered with a different definition")]
    FormatConflict {
        /// Format name
        name: String,
    },

    /// No format is registered under this name
    #[error("Unknown format: {name}")]
    UnknownFormat {
        /// Format name
        name: String,
    },

    /// Configuration could not be parsed or is out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cross-call lock could not be taken in time
    #[error("Timed out after {waited:?} waiting for the call lock during {operation}")]
    LockTimeout {
        /// Operation that wanted the lock
        operation: String,
        /// Total time spent waiting
        waited: Duration,
    },

    /// A worker thread could not be spawned
    #[error("Failed to start worker thread '{name}': {reason}")]
    Thread {
        /// Thread name
        name: String,
        /// OS error text
        reason: String,
    },
}

impl MediaError {
    /// Create an invalid format error
    pub fn invalid_format(details: impl Into<String>) -> Self {
        Self::InvalidFormat {
            details: details.into(),
        }
    }

    /// Create a configuration error
    pub fn config(details: impl Into<String>) -> Self {
        Self::Config(details.into())
    }

    /// Whether this error leaves the engine unusable.
    ///
    /// Only an expired call lock is fatal: the engine has already raised an
    /// alarm and requested a restart by the time this error is returned.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}
