use std::path::PathBuf;

use thiserror::Error;

/// Failures the retail pipeline reports by kind rather than by message.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Input file not found: {0:?}")]
    InputNotFound(PathBuf),
    #[error("Required column '{0}' is missing from the input headers")]
    MissingColumn(String),
    #[error("Row {row}: cannot parse '{value}' as a date")]
    InvalidDate { row: usize, value: String },
    #[error("Row {row}: cannot parse '{value}' as {column}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("Aggregate '{table}' is degenerate: {reason}")]
    DegenerateAggregate { table: String, reason: String },
}

impl InsightError {
    pub(crate) fn degenerate(table: impl Into<String>, reason: impl Into<String>) -> Self {
        InsightError::DegenerateAggregate {
            table: table.into(),
            reason: reason.into(),
        }
    }
}
