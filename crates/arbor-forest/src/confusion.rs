//! Confusion matrix and per-class classification metrics.

use std::fmt;

use crate::error::ForestError;

/// Counts of true versus predicted classes.
///
/// Entry `matrix[true_class][predicted_class]` counts how many rows with
/// true class `true_class` were predicted as `predicted_class`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// TP / (TP + FP); 0.0 if the class was never predicted.
    pub precision: f64,
    /// TP / (TP + FN); 0.0 if the class never occurs.
    pub recall: f64,
    /// Harmonic mean of precision and recall; 0.0 if both are zero.
    pub f1: f64,
    /// Number of rows whose true class is this one.
    pub support: usize,
}

impl ConfusionMatrix {
    /// An all-zero matrix over `n_classes` classes.
    #[must_use]
    pub fn new(n_classes: usize) -> Self {
        Self {
            matrix: vec![vec![0; n_classes]; n_classes],
        }
    }

    /// Build a matrix from paired true and predicted classes.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if the slices differ in
    /// length or a class is `>= n_classes`.
    pub fn from_labels(
        truth: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, ForestError> {
        if truth.len() != predicted.len() {
            return Err(ForestError::invariant(format!(
                "{} true labels but {} predictions",
                truth.len(),
                predicted.len()
            )));
        }
        let mut cm = Self::new(n_classes);
        for (&t, &p) in truth.iter().zip(predicted) {
            cm.record(t, p)?;
        }
        Ok(cm)
    }

    /// Count one prediction.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if either class is out of range.
    pub fn record(&mut self, truth: usize, predicted: usize) -> Result<(), ForestError> {
        let n = self.n_classes();
        let cell = self
            .matrix
            .get_mut(truth)
            .and_then(|row| row.get_mut(predicted))
            .ok_or_else(|| {
                ForestError::invariant(format!(
                    "class pair ({truth}, {predicted}) outside {n} classes"
                ))
            })?;
        *cell += 1;
        Ok(())
    }

    /// Number of correct predictions (the diagonal).
    #[must_use]
    pub fn correct(&self) -> usize {
        self.matrix.iter().enumerate().map(|(i, row)| row[i]).sum()
    }

    /// Number of incorrect predictions (everything off the diagonal).
    #[must_use]
    pub fn incorrect(&self) -> usize {
        self.total() - self.correct()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Fraction of correct predictions; 0.0 for an empty matrix.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    /// Precision, recall, F1 and support for every class.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let n = self.n_classes();
        (0..n)
            .map(|c| {
                let tp = self.matrix[c][c];
                let predicted_c: usize = (0..n).map(|i| self.matrix[i][c]).sum();
                let support: usize = self.matrix[c].iter().sum();
                let precision = ratio(tp, predicted_c);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.matrix.len()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes() {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;
        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "true_{i:>3}")?;
            for val in row {
                write!(f, " {val:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ConfusionMatrix;
    use crate::error::ForestError;

    #[test]
    fn correct_and_incorrect_partition_the_total() {
        let truth = [0, 0, 0, 1, 1, 1, 2, 2, 2];
        let pred = [0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&truth, &pred, 3).unwrap();
        assert_eq!(cm.correct(), 6);
        assert_eq!(cm.incorrect(), 3);
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-10);

        let metrics = cm.class_metrics();
        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(metrics[0].support, 3);
    }

    #[test]
    fn unpredicted_class_has_zero_precision() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 0], 2).unwrap();
        let metrics = cm.class_metrics();
        assert!(metrics[1].precision.abs() < f64::EPSILON);
        assert!(metrics[1].f1.abs() < f64::EPSILON);
    }

    #[test]
    fn empty_matrix_has_zero_accuracy() {
        let cm = ConfusionMatrix::new(3);
        assert_eq!(cm.total(), 0);
        assert!(cm.accuracy().abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_class_is_rejected() {
        let err = ConfusionMatrix::from_labels(&[0, 5], &[0, 1], 2).unwrap_err();
        assert!(matches!(err, ForestError::InvariantViolation { .. }));
        let err = ConfusionMatrix::from_labels(&[0], &[0, 1], 2).unwrap_err();
        assert!(matches!(err, ForestError::InvariantViolation { .. }));
    }

    #[test]
    fn display_formatting() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 2).unwrap();
        let output = format!("{cm}");
        assert!(output.contains("pred_"));
        assert!(output.contains("true_"));
    }
}
