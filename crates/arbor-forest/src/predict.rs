//! Prediction methods for the forest.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::ForestError;
use crate::forest::Forest;
use crate::schema::FieldSource;
use crate::tree::majority;

/// Per-class vote counts from every tree of a forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVotes {
    counts: Vec<usize>,
}

impl ClassVotes {
    /// The class with the most votes; the lowest class index wins ties.
    #[must_use]
    pub fn winner(&self) -> Option<usize> {
        majority(&self.counts)
    }

    /// Share of trees that voted for `class`.
    #[must_use]
    pub fn fraction(&self, class: usize) -> f64 {
        let total: usize = self.counts.iter().sum();
        match (self.counts.get(class), total) {
            (Some(&c), t) if t > 0 => c as f64 / t as f64,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.counts
    }
}

impl Forest {
    /// Collect one vote per tree for an encoded record.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if any tree fails to
    /// traverse the record.
    pub fn votes<F: FieldSource + ?Sized>(&self, record: &F) -> Result<ClassVotes, ForestError> {
        let mut counts = vec![0usize; self.schema.n_classes()];
        for tree in &self.trees {
            let class = tree.predict(record)?;
            let slot = counts.get_mut(class).ok_or_else(|| {
                ForestError::invariant(format!("tree {} voted for unknown class {class}", tree.id()))
            })?;
            *slot += 1;
        }
        Ok(ClassVotes { counts })
    }

    /// Majority-vote class index for an encoded record.
    ///
    /// # Errors
    ///
    /// See [`Forest::votes`].
    pub fn predict_class<F: FieldSource + ?Sized>(&self, record: &F) -> Result<usize, ForestError> {
        self.votes(record)?
            .winner()
            .ok_or_else(|| ForestError::invariant("forest has no trees to vote"))
    }

    /// Majority-vote label for a raw record laid out like the training header.
    ///
    /// The id and label fields of `record` are ignored. Categorical levels
    /// never seen in training take the complement branch of every equality
    /// test.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::RecordLengthMismatch`] | `record` width differs from the header |
    /// | [`ForestError::UnparseableField`] | a numeric feature field is not a finite number |
    /// | [`ForestError::InvariantViolation`] | a tree is structurally broken |
    pub fn predict<S: AsRef<str>>(&self, record: &[S]) -> Result<&str, ForestError> {
        let encoded = self.schema.encode(record)?;
        let class = self.predict_class(&encoded)?;
        self.schema
            .class_name(class)
            .ok_or_else(|| ForestError::invariant(format!("class {class} has no label")))
    }

    /// Predict labels for a batch of raw records in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first error any record produces; see [`Forest::predict`].
    pub fn predict_batch<S: AsRef<str> + Sync>(
        &self,
        records: &[Vec<S>],
    ) -> Result<Vec<&str>, ForestError> {
        records
            .par_iter()
            .map(|record| self.predict(record.as_slice()))
            .collect()
    }

    /// Class labels in class-index order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        self.schema.classes()
    }
}

#[cfg(test)]
mod tests {
    use super::ClassVotes;
    use crate::config::ForestConfig;
    use crate::dataset::tests::four_row_table;
    use crate::error::ForestError;
    use crate::schema::LabelColumn;

    #[test]
    fn ties_go_to_lowest_class() {
        let votes = ClassVotes {
            counts: vec![1, 3, 3],
        };
        assert_eq!(votes.winner(), Some(1));
        assert!((votes.fraction(2) - 3.0 / 7.0).abs() < 1e-12);
        assert!(votes.fraction(9).abs() < f64::EPSILON);
    }

    #[test]
    fn predicts_training_labels() {
        let ds = four_row_table();
        let result = ForestConfig::new(15)
            .unwrap()
            .fit(&ds, &LabelColumn::Last)
            .unwrap();
        let forest = result.forest();
        assert_eq!(forest.classes(), ["no", "yes"]);
        assert_eq!(forest.predict(&["", "x", "1", ""]).unwrap(), "no");
        assert_eq!(forest.predict(&["", "y", "2", ""]).unwrap(), "yes");

        let votes = forest
            .votes(&forest.schema().encode(&["", "y", "1", ""]).unwrap())
            .unwrap();
        assert_eq!(votes.as_slice().iter().sum::<usize>(), 15);
    }

    #[test]
    fn batch_matches_single_predictions() {
        let ds = four_row_table();
        let result = ForestConfig::new(5)
            .unwrap()
            .fit(&ds, &LabelColumn::Last)
            .unwrap();
        let forest = result.forest();
        let records: Vec<Vec<String>> = ds.rows().map(<[String]>::to_vec).collect();
        let batch = forest.predict_batch(&records).unwrap();
        for (record, label) in records.iter().zip(&batch) {
            assert_eq!(forest.predict(record.as_slice()).unwrap(), *label);
        }
    }

    #[test]
    fn malformed_records_are_rejected() {
        let ds = four_row_table();
        let result = ForestConfig::new(2)
            .unwrap()
            .fit(&ds, &LabelColumn::Last)
            .unwrap();
        let forest = result.forest();
        assert!(matches!(
            forest.predict(&["1", "x"]),
            Err(ForestError::RecordLengthMismatch { .. })
        ));
        assert!(matches!(
            forest.predict(&["1", "x", "n/a", "no"]),
            Err(ForestError::UnparseableField { column: 2, .. })
        ));
    }
}
