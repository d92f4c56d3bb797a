//! Training result types.

use crate::forest::Forest;
use crate::importance::RankedFeature;
use crate::oob::OobScore;

/// Metadata about the training run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_trees: usize,
    /// Number of data rows in the dataset (header excluded).
    pub n_rows: usize,
    /// Number of columns eligible for splitting.
    pub n_features: usize,
    /// Number of distinct classes.
    pub n_classes: usize,
    /// Draws requested per bootstrap sample.
    pub sample_size: usize,
    /// Draws dropped across all trees because they matched no row.
    pub n_discarded_draws: usize,
}

/// Result of forest training: the forest, optional OOB score, and metadata.
#[derive(Debug, Clone)]
pub struct ForestResult {
    forest: Forest,
    oob_score: Option<OobScore>,
    metadata: TrainingMetadata,
}

impl ForestResult {
    pub(crate) fn new(
        forest: Forest,
        oob_score: Option<OobScore>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            oob_score,
            metadata,
        }
    }

    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Consume the result and return the forest.
    #[must_use]
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Ranked, normalized feature importances of the forest.
    #[must_use]
    pub fn importances(&self) -> Vec<RankedFeature> {
        self.forest.ranked_importances()
    }

    /// The OOB score, if OOB evaluation was enabled.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
