use std::fmt;

use rayon::prelude::*;

use crate::error::ForestError;
use crate::node::SplitTest;
use crate::schema::TrainingFrame;
use crate::split::split_impurity;

/// Executes batches of candidate-split scorings.
///
/// Implementations must return exactly one weighted Gini per candidate, in
/// candidate order, and must be side-effect free with respect to the frame.
/// The choice of backend never changes which split wins.
pub trait ComputeBackend: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Score every candidate against `rows`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if a candidate names a
    /// column the frame does not encode.
    fn evaluate_batch(
        &self,
        frame: &TrainingFrame,
        rows: &[usize],
        candidates: &[SplitTest],
    ) -> Result<Vec<f64>, ForestError>;
}

/// Scores candidates one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialBackend;

impl ComputeBackend for SequentialBackend {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn evaluate_batch(
        &self,
        frame: &TrainingFrame,
        rows: &[usize],
        candidates: &[SplitTest],
    ) -> Result<Vec<f64>, ForestError> {
        candidates
            .iter()
            .map(|test| split_impurity(frame, rows, test))
            .collect()
    }
}

/// Scores candidates across the rayon thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBackend;

impl ComputeBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn evaluate_batch(
        &self,
        frame: &TrainingFrame,
        rows: &[usize],
        candidates: &[SplitTest],
    ) -> Result<Vec<f64>, ForestError> {
        candidates
            .par_iter()
            .map(|test| split_impurity(frame, rows, test))
            .collect()
    }
}

/// Selects one of the built-in backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sequential,
    Parallel,
}

impl BackendKind {
    #[must_use]
    pub fn backend(self) -> &'static dyn ComputeBackend {
        match self {
            Self::Sequential => &SequentialBackend,
            Self::Parallel => &ParallelBackend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, ComputeBackend, ParallelBackend, SequentialBackend};
    use crate::dataset::tests::four_row_table;
    use crate::error::ForestError;
    use crate::node::{ColumnIndex, SplitTest, SplitValue};
    use crate::schema::{LabelColumn, TrainingFrame};

    fn candidates() -> Vec<SplitTest> {
        vec![
            SplitTest {
                column: ColumnIndex::new(1),
                value: SplitValue::Level(0),
            },
            SplitTest {
                column: ColumnIndex::new(2),
                value: SplitValue::Threshold(1.5),
            },
        ]
    }

    #[test]
    fn one_score_per_candidate_in_order() {
        let frame = TrainingFrame::new(&four_row_table(), &LabelColumn::Last).unwrap();
        let scores = SequentialBackend
            .evaluate_batch(&frame, &[0, 1, 2, 3], &candidates())
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0].abs() < 1e-12);
        assert!((scores[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn parallel_matches_sequential() {
        let frame = TrainingFrame::new(&four_row_table(), &LabelColumn::Last).unwrap();
        let rows = [0, 0, 1, 2, 3, 3];
        let seq = SequentialBackend
            .evaluate_batch(&frame, &rows, &candidates())
            .unwrap();
        let par = ParallelBackend
            .evaluate_batch(&frame, &rows, &candidates())
            .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn unknown_column_is_an_invariant_violation() {
        let frame = TrainingFrame::new(&four_row_table(), &LabelColumn::Last).unwrap();
        let bad = [SplitTest {
            column: ColumnIndex::new(0),
            value: SplitValue::Level(0),
        }];
        let err = SequentialBackend
            .evaluate_batch(&frame, &[0], &bad)
            .unwrap_err();
        assert!(matches!(err, ForestError::InvariantViolation { .. }));
    }

    #[test]
    fn kind_selects_backend() {
        assert_eq!(BackendKind::default().backend().name(), "sequential");
        assert_eq!(BackendKind::Parallel.backend().name(), "parallel");
    }
}
