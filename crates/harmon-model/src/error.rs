//! Model error types.

use thiserror::Error;

/// Errors from table and model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Requested column does not exist in the table.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A column with this name already exists.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Index-aligned lists have mismatched lengths.
    #[error("Length mismatch for '{context}': expected {expected}, got {actual}")]
    LengthMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },
}
