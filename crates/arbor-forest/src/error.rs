/// Errors from dataset loading, sampling, tree growth and forest training.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when the table source has no header or no data rows.
    #[error("table source is empty")]
    EmptySource,

    /// Returned when the header row has zero fields.
    #[error("table header has zero columns")]
    ZeroColumns,

    /// Returned when a data row has a different field count than the header.
    #[error("row {row_index} has {got} fields, expected {expected}")]
    RaggedRow {
        /// The zero-based row index, counting the header as row 0.
        row_index: usize,
        /// The number of fields in the header.
        expected: usize,
        /// The number of fields in the offending row.
        got: usize,
    },

    /// Returned when two data rows carry the same identifier.
    #[error("row id {id:?} appears at rows {first_row} and {second_row}")]
    DuplicateRowId {
        /// The repeated identifier.
        id: String,
        /// Row index of the first occurrence, counting the header as row 0.
        first_row: usize,
        /// Row index of the repeated occurrence.
        second_row: usize,
    },

    /// Returned when the label column cannot be resolved or is not usable.
    #[error("invalid label column {column:?}: {reason}")]
    InvalidLabelColumn {
        /// The label column as requested by the caller.
        column: String,
        /// Why the column was rejected.
        reason: &'static str,
    },

    /// Returned when a bootstrap sample of zero rows is requested.
    #[error("sample count must be at least 1, got {count}")]
    InvalidSampleCount {
        /// The invalid sample count.
        count: usize,
    },

    /// Returned when no row can ever be drawn by the sampler.
    #[error("dataset has no sampleable rows")]
    NoSampleableRows,

    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_split is less than 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// The invalid min_samples_split value provided.
        min_samples_split: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when min_impurity_decrease is negative or not finite.
    #[error("min_impurity_decrease must be finite and non-negative, got {value}")]
    InvalidMinImpurityDecrease {
        /// The invalid threshold.
        value: f64,
    },

    /// Returned when a record passed to prediction has the wrong width.
    #[error("record has {got} fields, expected {expected}")]
    RecordLengthMismatch {
        /// The number of columns in the training schema.
        expected: usize,
        /// The number of fields in the record.
        got: usize,
    },

    /// Returned when a numeric feature field of a record does not parse.
    #[error("field {raw:?} in numeric column {column} is not a finite number")]
    UnparseableField {
        /// Zero-based column index.
        column: usize,
        /// The raw field text.
        raw: String,
    },

    /// Returned when OOB evaluation fails (no row has any OOB tree).
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Human-readable description of why OOB evaluation failed.
        reason: String,
    },

    /// Returned when training observes a cancellation request.
    #[error("training was cancelled")]
    Cancelled,

    /// Returned when an internal structural guarantee does not hold.
    #[error("invariant violated: {reason}")]
    InvariantViolation {
        /// Description of the broken guarantee.
        reason: String,
    },
}

impl ForestError {
    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Return `true` for errors caused by a malformed table source.
    #[must_use]
    pub fn is_data_format(&self) -> bool {
        matches!(
            self,
            Self::EmptySource
                | Self::ZeroColumns
                | Self::RaggedRow { .. }
                | Self::DuplicateRowId { .. }
        )
    }

    /// Return `true` for errors caused by an invalid caller-supplied argument.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidLabelColumn { .. }
                | Self::InvalidSampleCount { .. }
                | Self::NoSampleableRows
                | Self::InvalidTreeCount { .. }
                | Self::InvalidMaxDepth { .. }
                | Self::InvalidMinSamplesSplit { .. }
                | Self::InvalidMinSamplesLeaf { .. }
                | Self::InvalidMinImpurityDecrease { .. }
                | Self::RecordLengthMismatch { .. }
                | Self::UnparseableField { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ForestError;

    #[test]
    fn ragged_row_message() {
        let err = ForestError::RaggedRow {
            row_index: 3,
            expected: 4,
            got: 2,
        };
        assert_eq!(err.to_string(), "row 3 has 2 fields, expected 4");
    }

    #[test]
    fn format_errors_are_classified() {
        assert!(ForestError::EmptySource.is_data_format());
        assert!(!ForestError::EmptySource.is_invalid_argument());
        assert!(ForestError::NoSampleableRows.is_invalid_argument());
        assert!(!ForestError::Cancelled.is_data_format());
        assert!(!ForestError::invariant("x").is_invalid_argument());
    }
}
