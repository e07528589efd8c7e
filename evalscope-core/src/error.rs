//! Error types for evalscope-core

use thiserror::Error;

use crate::report::Stage;

/// Main error type for the evalscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transcript export could not be loaded
    #[error("failed to load transcripts from {source_name}: {message}")]
    Load {
        source_name: String,
        message: String,
    },

    /// A remote endpoint failed or returned a non-2xx response
    #[error("{stage} failed: {message}")]
    Remote { stage: Stage, message: String },

    /// A remote endpoint did not answer in time
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    /// Every map-stage chunk failed
    #[error("All batches failed to process.")]
    AllBatchesFailed,

    /// A report run is already in flight
    #[error("a report is already being generated")]
    PipelineBusy,

    /// Illegal pipeline state transition
    #[error("invalid pipeline transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Workbench query rejected
    #[error("workbench error: {0}")]
    Workbench(String),
}

impl Error {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Server errors, timeouts and connection failures are transient; client
    /// errors and everything local are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Remote { message, .. } => {
                message.contains("API error (5")
                    || message.contains("timeout")
                    || message.contains("connection")
                    || message.contains("request failed")
            }
            _ => false,
        }
    }
}

/// Result type alias for evalscope-core
pub type Result<T> = std::result::Result<T, Error>;
