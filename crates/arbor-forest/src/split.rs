use std::collections::BTreeMap;

use tracing::trace;

use crate::backend::ComputeBackend;
use crate::dataset::ColumnKind;
use crate::error::ForestError;
use crate::node::{ColumnIndex, Impurity, SplitTest, SplitValue};
use crate::schema::{FieldValue, TrainingFrame};

/// Two weighted impurities closer than this are treated as equal, and the
/// canonical candidate order decides.
pub const TIE_TOLERANCE: f64 = 1e-12;

/// Gini impurity `1 - Σ p_i²` of a class histogram.
///
/// Returns `0.0` when `n_rows` is zero.
#[must_use]
pub fn gini(class_counts: &[usize], n_rows: usize) -> Impurity {
    if n_rows == 0 {
        return Impurity::new(0.0);
    }
    let n = n_rows as f64;
    let sum_sq: f64 = class_counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum();
    Impurity::new(1.0 - sum_sq)
}

/// Size-weighted Gini of a two-way partition: `n1/n · G(left) + n2/n · G(right)`.
#[must_use]
pub fn weighted_gini(left: &[usize], right: &[usize]) -> f64 {
    let n_left: usize = left.iter().sum();
    let n_right: usize = right.iter().sum();
    let n = n_left + n_right;
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    (n_left as f64 / n) * gini(left, n_left).value()
        + (n_right as f64 / n) * gini(right, n_right).value()
}

/// Class histogram of a row multiset.
pub(crate) fn class_counts(frame: &TrainingFrame, rows: &[usize]) -> Vec<usize> {
    let labels = frame.labels();
    let mut counts = vec![0usize; frame.n_classes()];
    for &row in rows {
        counts[labels[row]] += 1;
    }
    counts
}

/// Weighted Gini of the partition `test` induces on `rows`.
///
/// # Errors
///
/// Returns [`ForestError::InvariantViolation`] if the test names a column the
/// frame does not encode or a row outside the frame.
pub fn split_impurity(
    frame: &TrainingFrame,
    rows: &[usize],
    test: &SplitTest,
) -> Result<f64, ForestError> {
    let labels = frame.labels();
    let mut left = vec![0usize; frame.n_classes()];
    let mut right = vec![0usize; frame.n_classes()];
    for &row in rows {
        let value = frame.value(row, test.column).ok_or_else(|| {
            ForestError::invariant(format!("no value at row {row}, column {}", test.column))
        })?;
        if test.goes_left(value) {
            left[labels[row]] += 1;
        } else {
            right[labels[row]] += 1;
        }
    }
    Ok(weighted_gini(&left, &right))
}

/// The lowest-impurity split found for a row subset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestSplit {
    /// The winning column and value.
    pub test: SplitTest,
    /// Weighted Gini of the partition it induces.
    pub impurity: f64,
}

/// Enumerates and scores candidate splits over a [`TrainingFrame`].
#[derive(Debug, Clone, Copy)]
pub struct SplitEvaluator<'a> {
    frame: &'a TrainingFrame,
    backend: &'a dyn ComputeBackend,
    min_samples_leaf: usize,
}

impl<'a> SplitEvaluator<'a> {
    #[must_use]
    pub fn new(frame: &'a TrainingFrame, backend: &'a dyn ComputeBackend) -> Self {
        Self {
            frame,
            backend,
            min_samples_leaf: 1,
        }
    }

    /// Drop candidates leaving fewer than `min_samples_leaf` rows on a side.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf.max(1);
        self
    }

    /// Whether `column` is split on thresholds or on level equality.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if `column` is out of range.
    pub fn mode(&self, column: ColumnIndex) -> Result<ColumnKind, ForestError> {
        self.frame
            .schema()
            .column_kind(column)
            .ok_or_else(|| ForestError::invariant(format!("unknown column {column}")))
    }

    /// Candidate values for `column` over `rows`, ascending.
    ///
    /// Numeric columns yield midpoints between consecutive distinct values;
    /// categorical columns yield each distinct level present. A column with
    /// fewer than two distinct values yields nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if `column` is not an
    /// encoded feature column.
    pub fn candidates(
        &self,
        rows: &[usize],
        column: ColumnIndex,
    ) -> Result<Vec<SplitValue>, ForestError> {
        let n = rows.len();
        let msl = self.min_samples_leaf;
        match self.mode(column)? {
            ColumnKind::Numeric => {
                let mut values = self.numeric_values(rows, column)?;
                values.sort_unstable_by(f64::total_cmp);

                let mut out = Vec::new();
                for i in 0..n.saturating_sub(1) {
                    let (current, next) = (values[i], values[i + 1]);
                    if current == next {
                        continue;
                    }
                    let n_left = i + 1;
                    if n_left < msl || n - n_left < msl {
                        continue;
                    }
                    let mid = (current + next) / 2.0;
                    // Adjacent floats can round the midpoint up onto `next`.
                    let threshold = if mid < next { mid } else { current };
                    out.push(SplitValue::Threshold(threshold));
                }
                Ok(out)
            }
            ColumnKind::Categorical => {
                let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
                for &row in rows {
                    match self.frame.value(row, column) {
                        Some(FieldValue::Level(Some(code))) => {
                            *counts.entry(code).or_default() += 1;
                        }
                        _ => {
                            return Err(ForestError::invariant(format!(
                                "row {row} has no level in column {column}"
                            )));
                        }
                    }
                }
                if counts.len() < 2 {
                    return Ok(Vec::new());
                }
                Ok(counts
                    .into_iter()
                    .filter(|&(_, count)| count >= msl && n - count >= msl)
                    .map(|(code, _)| SplitValue::Level(code))
                    .collect())
            }
        }
    }

    /// Weighted Gini of splitting `rows` on `column` at `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if `column` is not an
    /// encoded feature column.
    pub fn evaluate(
        &self,
        rows: &[usize],
        column: ColumnIndex,
        value: SplitValue,
    ) -> Result<f64, ForestError> {
        split_impurity(self.frame, rows, &SplitTest { column, value })
    }

    /// Lowest-impurity candidate across `columns`, or `None` if no column
    /// yields a candidate.
    ///
    /// Candidates are scored by the backend in canonical order (column
    /// ascending, then value ascending). Among scores within
    /// [`TIE_TOLERANCE`] of each other the earliest wins.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] on an out-of-range column
    /// or a backend result that does not match the candidate list.
    pub fn best_split(
        &self,
        rows: &[usize],
        columns: &[ColumnIndex],
    ) -> Result<Option<BestSplit>, ForestError> {
        let mut ordered = columns.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut candidates = Vec::new();
        for column in ordered {
            candidates.extend(
                self.candidates(rows, column)?
                    .into_iter()
                    .map(|value| SplitTest { column, value }),
            );
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        let scores = self.backend.evaluate_batch(self.frame, rows, &candidates)?;
        if scores.len() != candidates.len() {
            return Err(ForestError::invariant(format!(
                "backend {} returned {} scores for {} candidates",
                self.backend.name(),
                scores.len(),
                candidates.len()
            )));
        }

        let mut best: Option<BestSplit> = None;
        for (test, impurity) in candidates.into_iter().zip(scores) {
            if !impurity.is_finite() {
                return Err(ForestError::invariant(format!(
                    "non-finite impurity {impurity} for {test}"
                )));
            }
            if best.is_none_or(|b| impurity < b.impurity - TIE_TOLERANCE) {
                best = Some(BestSplit { test, impurity });
            }
        }

        if let Some(b) = &best {
            trace!(test = %b.test, impurity = b.impurity, n_rows = rows.len(), "best split");
        }
        Ok(best)
    }

    /// Route `rows` through `test` into left and right multisets.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if a row has no value in the
    /// tested column.
    pub fn partition(
        &self,
        rows: &[usize],
        test: &SplitTest,
    ) -> Result<(Vec<usize>, Vec<usize>), ForestError> {
        let mut left = Vec::with_capacity(rows.len() / 2);
        let mut right = Vec::with_capacity(rows.len() / 2);
        for &row in rows {
            let value = self.frame.value(row, test.column).ok_or_else(|| {
                ForestError::invariant(format!("no value at row {row}, column {}", test.column))
            })?;
            if test.goes_left(value) {
                left.push(row);
            } else {
                right.push(row);
            }
        }
        Ok((left, right))
    }

    fn numeric_values(&self, rows: &[usize], column: ColumnIndex) -> Result<Vec<f64>, ForestError> {
        rows.iter()
            .map(|&row| match self.frame.value(row, column) {
                Some(FieldValue::Number(v)) => Ok(v),
                _ => Err(ForestError::invariant(format!(
                    "row {row} has no number in column {column}"
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{SplitEvaluator, TIE_TOLERANCE, gini, weighted_gini};
    use crate::backend::{ParallelBackend, SequentialBackend};
    use crate::dataset::tests::{four_row_table, records};
    use crate::dataset::{ColumnKind, Dataset};
    use crate::error::ForestError;
    use crate::node::{ColumnIndex, SplitValue};
    use crate::schema::{LabelColumn, TrainingFrame};

    fn frame() -> TrainingFrame {
        TrainingFrame::new(&four_row_table(), &LabelColumn::Last).unwrap()
    }

    fn numeric_frame() -> TrainingFrame {
        let ds = Dataset::from_records(records(&[
            &["id", "x", "label"],
            &["1", "1.0", "a"],
            &["2", "2.0", "a"],
            &["3", "2.0", "b"],
            &["4", "5.0", "b"],
            &["5", "9.0", "b"],
        ]))
        .unwrap();
        TrainingFrame::new(&ds, &LabelColumn::Last).unwrap()
    }

    #[test]
    fn gini_of_pure_subset_is_zero() {
        assert!(gini(&[5, 0], 5).value().abs() < f64::EPSILON);
        assert!(gini(&[], 0).value().abs() < f64::EPSILON);
    }

    #[test]
    fn gini_of_even_binary_split_is_half() {
        for k in [1, 2, 50] {
            assert!((gini(&[k, k], 2 * k).value() - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn gini_stays_in_unit_interval() {
        let g = gini(&[1, 1, 1, 1], 4).value();
        assert!((g - 0.75).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&g));
    }

    #[test]
    fn weighted_gini_weights_by_size() {
        // Left pure (3 rows), right 1:1 (2 rows): 3/5 * 0 + 2/5 * 0.5.
        assert!((weighted_gini(&[3, 0], &[1, 1]) - 0.2).abs() < 1e-12);
        assert!(weighted_gini(&[0, 0], &[0, 0]).abs() < f64::EPSILON);
    }

    #[test]
    fn mode_follows_column_kind() {
        let f = frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        assert_eq!(ev.mode(ColumnIndex::new(1)).unwrap(), ColumnKind::Categorical);
        assert_eq!(ev.mode(ColumnIndex::new(2)).unwrap(), ColumnKind::Numeric);
        assert!(matches!(
            ev.mode(ColumnIndex::new(9)),
            Err(ForestError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn numeric_candidates_are_midpoints() {
        let f = numeric_frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        let c = ev.candidates(&[0, 1, 2, 3, 4], ColumnIndex::new(1)).unwrap();
        assert_eq!(
            c,
            [
                SplitValue::Threshold(1.5),
                SplitValue::Threshold(3.5),
                SplitValue::Threshold(7.0)
            ]
        );
    }

    #[test]
    fn min_samples_leaf_filters_candidates() {
        let f = numeric_frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend).with_min_samples_leaf(2);
        let c = ev.candidates(&[0, 1, 2, 3, 4], ColumnIndex::new(1)).unwrap();
        assert_eq!(c, [SplitValue::Threshold(3.5)]);
    }

    #[test]
    fn single_valued_column_has_no_candidates() {
        let f = frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        assert!(ev.candidates(&[0, 1], ColumnIndex::new(1)).unwrap().is_empty());
        assert!(ev.candidates(&[0, 2], ColumnIndex::new(2)).unwrap().is_empty());
        assert!(ev.candidates(&[], ColumnIndex::new(2)).unwrap().is_empty());
    }

    #[test]
    fn categorical_candidates_are_levels() {
        let f = frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        let c = ev.candidates(&[0, 1, 2, 3], ColumnIndex::new(1)).unwrap();
        assert_eq!(c, [SplitValue::Level(0), SplitValue::Level(1)]);
    }

    #[test]
    fn evaluate_separating_and_useless_splits() {
        let f = frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        let rows = [0, 1, 2, 3];
        let a = ev.evaluate(&rows, ColumnIndex::new(1), SplitValue::Level(0)).unwrap();
        assert!(a.abs() < 1e-12);
        let b = ev
            .evaluate(&rows, ColumnIndex::new(2), SplitValue::Threshold(1.5))
            .unwrap();
        assert!((b - 0.5).abs() < 1e-12);
    }

    #[test]
    fn best_split_picks_separating_column() {
        let f = frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        let best = ev
            .best_split(&[0, 1, 2, 3], &[ColumnIndex::new(2), ColumnIndex::new(1)])
            .unwrap()
            .unwrap();
        assert_eq!(best.test.column, ColumnIndex::new(1));
        assert_eq!(best.test.value, SplitValue::Level(0));
        assert!(best.impurity.abs() < TIE_TOLERANCE);
    }

    #[test]
    fn ties_go_to_lowest_column() {
        // Columns 1 and 2 are identical copies; column 1 must win.
        let ds = Dataset::from_records(records(&[
            &["id", "p", "q", "label"],
            &["1", "1", "1", "a"],
            &["2", "2", "2", "b"],
        ]))
        .unwrap();
        let f = TrainingFrame::new(&ds, &LabelColumn::Last).unwrap();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        let best = ev
            .best_split(&[0, 1], &[ColumnIndex::new(2), ColumnIndex::new(1)])
            .unwrap()
            .unwrap();
        assert_eq!(best.test.column, ColumnIndex::new(1));
    }

    #[test]
    fn backends_agree_on_best_split() {
        let f = numeric_frame();
        let rows = [0, 1, 2, 3, 4, 4, 0];
        let seq = SplitEvaluator::new(&f, &SequentialBackend)
            .best_split(&rows, &[ColumnIndex::new(1)])
            .unwrap();
        let par = SplitEvaluator::new(&f, &ParallelBackend)
            .best_split(&rows, &[ColumnIndex::new(1)])
            .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn best_split_without_candidates_is_none() {
        let f = frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        assert!(ev.best_split(&[0, 1], &[ColumnIndex::new(1)]).unwrap().is_none());
        assert!(ev.best_split(&[0, 1, 2, 3], &[]).unwrap().is_none());
    }

    #[test]
    fn partition_routes_rows() {
        let f = numeric_frame();
        let ev = SplitEvaluator::new(&f, &SequentialBackend);
        let test = crate::node::SplitTest {
            column: ColumnIndex::new(1),
            value: SplitValue::Threshold(3.5),
        };
        let (left, right) = ev.partition(&[4, 0, 2, 3, 0], &test).unwrap();
        assert_eq!(left, [0, 2, 0]);
        assert_eq!(right, [4, 3]);
    }
}
