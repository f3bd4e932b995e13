//! Error types for UMAS task dispatch.
//!
//! Every protocol-layer failure surfaces as a distinct variant so callers can
//! tell a missing rendezvous file from a dead server or a corrupt frame.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the UMAS library.
#[derive(Debug, Error)]
pub enum UmasError {
    // Rendezvous errors
    #[error("Port file is not found.: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Timeout: Port file not found after {} seconds: {}", waited.as_secs_f64(), path.display())]
    Timeout { path: PathBuf, waited: Duration },

    // Socket errors
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Framing errors
    #[error("Truncated frame: expected {expected} bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("Frame of {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    // Serialization errors
    #[error("Failed to encode payload: {message}")]
    Encode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Failed to decode payload: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Dispatch cancelled")]
    Cancelled,

    // Utility parsing errors
    #[error("Invalid integer list {input:?}: {message}")]
    InvalidIntList { input: String, message: String },
}

/// Result type alias for UMAS operations.
pub type Result<T> = std::result::Result<T, UmasError>;

impl From<std::io::Error> for UmasError {
    fn from(err: std::io::Error) -> Self {
        UmasError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl UmasError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        UmasError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Wrap a socket-level failure.
    pub fn connection(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        UmasError::Connection {
            message: format!("{}: {}", context, err),
            source: Some(err),
        }
    }

    pub fn encode(err: serde_json::Error) -> Self {
        UmasError::Encode {
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn decode(err: serde_json::Error) -> Self {
        UmasError::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// True for failures that mean the server could not be reached or dropped
    /// the connection mid-exchange.
    pub fn is_connection(&self) -> bool {
        matches!(self, UmasError::Connection { .. })
    }
}
