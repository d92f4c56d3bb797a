//! I/O error types for arbor-io.

use std::path::PathBuf;

use arbor_forest::ForestError;

/// Errors from opening, tokenizing, and validating a delimited table.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the tokenizer encounters a malformed record.
    #[error("parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the table file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the field delimiter is not a single-byte ASCII character.
    #[error("delimiter {delimiter:?} is not an ASCII character")]
    InvalidDelimiter {
        /// The rejected delimiter.
        delimiter: char,
    },

    /// Returned when the tokenized records do not form a valid dataset.
    #[error("invalid table in {path}")]
    Format {
        /// Path to the table file.
        path: PathBuf,
        /// The dataset validation failure.
        source: ForestError,
    },
}
