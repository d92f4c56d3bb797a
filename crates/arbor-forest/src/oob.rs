//! Out-of-bag (OOB) evaluation.

use crate::confusion::ConfusionMatrix;
use crate::error::ForestError;
use crate::schema::TrainingFrame;
use crate::tree::{Tree, majority};

/// Out-of-bag evaluation result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OobScore {
    /// Fraction of OOB-evaluated rows whose vote matched their class.
    pub accuracy: f64,
    /// Confusion matrix over OOB-evaluated rows.
    pub confusion: ConfusionMatrix,
    /// Number of rows left out of at least one tree's sample.
    pub n_oob_rows: usize,
}

/// Score every row by majority vote of the trees that did not sample it.
///
/// Rows drawn by every tree are skipped. Vote ties go to the lowest class.
pub(crate) fn compute_oob(trees: &[Tree], frame: &TrainingFrame) -> Result<OobScore, ForestError> {
    let n_classes = frame.n_classes();
    let mut votes = vec![vec![0usize; n_classes]; frame.n_rows()];

    for tree in trees {
        for &position in tree.sample().out_of_bag() {
            let predicted = tree.predict(&frame.row(position))?;
            let slot = votes
                .get_mut(position)
                .and_then(|v| v.get_mut(predicted))
                .ok_or_else(|| {
                    ForestError::invariant(format!(
                        "OOB row {position} or class {predicted} out of range"
                    ))
                })?;
            *slot += 1;
        }
    }

    let mut confusion = ConfusionMatrix::new(n_classes);
    let mut n_oob_rows = 0;
    for (position, row_votes) in votes.iter().enumerate() {
        if let Some(predicted) = majority(row_votes) {
            confusion.record(frame.labels()[position], predicted)?;
            n_oob_rows += 1;
        }
    }
    if n_oob_rows == 0 {
        return Err(ForestError::OobEvaluationFailed {
            reason: "no row was left out of any tree's sample".to_string(),
        });
    }

    Ok(OobScore {
        accuracy: confusion.accuracy(),
        confusion,
        n_oob_rows,
    })
}
