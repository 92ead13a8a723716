//! Error types for the time-series pipeline

use thiserror::Error;

/// Failures that stop a pipeline run.
///
/// Per-window catalog hiccups never surface here; they become empty
/// records. What remains is bad configuration, fatal input problems and
/// output failures.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Fatal(#[from] cropscan_core::Error),

    #[error("Record sink error: {0}")]
    Sink(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Sink(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Sink(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Sink(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
