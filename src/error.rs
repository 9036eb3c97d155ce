//! Error types for the replenishment pipeline.
//!
//! Only input/output problems are fatal to a run. Per-row and per-pair
//! problems are recovered where they happen and never surface here,
//! except `FitFailed` / `FitTimeout`, which the engine turns into a
//! pair-level outcome.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// File could not be opened, created or written
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV content
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Required input columns are absent from the extract header
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Run configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Numerical failure while fitting a model
    #[error("Model fit failed: {0}")]
    FitFailed(String),

    /// Worker threads could not be started
    #[error("Could not start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Model fit exceeded the per-pair time budget
    #[error("Model fit timed out after {0:?}")]
    FitTimeout(std::time::Duration),
}

impl ForecastError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ForecastError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ForecastError::InvalidConfig(msg.into())
    }

    pub fn fit_failed(msg: impl Into<String>) -> Self {
        ForecastError::FitFailed(msg.into())
    }
}
