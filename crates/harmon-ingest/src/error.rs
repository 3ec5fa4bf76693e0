//! Ingest error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from CSV ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File could not be opened or read.
    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV content.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The input has no usable header row.
    #[error("CSV input has no header row: {0}")]
    MissingHeader(String),
}
