//! Error types for taskvault-sync.

use std::path::PathBuf;

use thiserror::Error;

use taskvault_core::ConfigError;
use taskvault_renderer::RenderError;

/// Failures talking to the task tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The tracker answered with a non-success status.
    #[error("tracker returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection, TLS or timeout failure.
    #[error("tracker transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("unexpected tracker response: {0}")]
    Decode(String),
}

/// Failures talking to the classification oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The completion had no message content.
    #[error("oracle returned an empty completion")]
    Empty,

    #[error("unexpected oracle response: {0}")]
    Decode(String),
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (cursor store).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A created-date range that is not `YYYY-MM-DD~YYYY-MM-DD` or runs backwards.
    #[error("invalid date range '{0}' (expected YYYY-MM-DD~YYYY-MM-DD)")]
    InvalidRange(String),

    /// Unknown `--mode` value.
    #[error("unknown sync mode '{0}' (expected incremental, full or a date range)")]
    InvalidMode(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
