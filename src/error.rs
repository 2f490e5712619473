//! Error types shared by the dispatch core, data sources, and exports.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors that abort a dispatch run or reject its inputs.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Meter data does not span the requested window. Fatal for a run.
    #[error("data coverage error: window [{requested_start}, {requested_end}) {detail}")]
    DataCoverage {
        requested_start: DateTime<Utc>,
        requested_end: DateTime<Utc>,
        detail: String,
    },

    /// Malformed session, signal, or meter records, or invalid settings.
    #[error("configuration error: {field} - {message}")]
    Configuration { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DispatchError {
    /// Creates a configuration error for the given field.
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a coverage error for the window `[start, end)`.
    pub fn coverage(start: DateTime<Utc>, end: DateTime<Utc>, detail: impl Into<String>) -> Self {
        DispatchError::DataCoverage {
            requested_start: start,
            requested_end: end,
            detail: detail.into(),
        }
    }
}
