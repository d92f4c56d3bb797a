//! Forest training with parallel tree construction.

use std::collections::BTreeMap;

use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::backend::ComputeBackend;
use crate::bootstrap::{self, RandomSource, SeededSource};
use crate::cancel::CancellationToken;
use crate::columns::ColumnRegistry;
use crate::config::{ForestConfig, OobMode};
use crate::dataset::Dataset;
use crate::error::ForestError;
use crate::importance::{RankedFeature, rank_importances};
use crate::node::{ColumnIndex, NodeKind};
use crate::oob::compute_oob;
use crate::result::{ForestResult, TrainingMetadata};
use crate::schema::{LabelColumn, Schema, TrainingFrame};
use crate::tree::{Tree, TreeBuilder};

/// A trained ensemble of decision trees.
#[derive(Debug, Clone)]
pub struct Forest {
    pub(crate) trees: Vec<Tree>,
    pub(crate) schema: Schema,
    pub(crate) columns: ColumnRegistry,
}

impl Forest {
    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Column layout, level codes and classes learned at training time.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Per-column metadata with impurity estimates accumulated over all trees.
    #[must_use]
    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    /// Mean impurity decrease per column, over every split node that tests it.
    ///
    /// Columns no tree split on are absent. Values are not normalized.
    #[must_use]
    pub fn feature_importance(&self) -> BTreeMap<ColumnIndex, f64> {
        let mut totals: BTreeMap<ColumnIndex, (f64, usize)> = BTreeMap::new();
        for node in self.trees.iter().flat_map(Tree::nodes) {
            if let NodeKind::Split {
                test,
                impurity_decrease,
                ..
            } = node.kind()
            {
                let entry = totals.entry(test.column).or_default();
                entry.0 += impurity_decrease;
                entry.1 += 1;
            }
        }
        totals
            .into_iter()
            .map(|(column, (sum, n))| (column, sum / n as f64))
            .collect()
    }

    /// Feature columns ranked by [`Forest::feature_importance`], normalized to
    /// sum to 1.0. Columns never split on appear with importance 0.0.
    #[must_use]
    pub fn ranked_importances(&self) -> Vec<RankedFeature> {
        rank_importances(&self.feature_importance(), &self.schema)
    }
}

/// Train the ensemble.
///
/// Per-tree seeds are drawn from `source` up front and in tree order, so the
/// forest does not depend on how trees are scheduled across threads.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_rows = dataset.n_data_rows()))]
pub(crate) fn train(
    config: &ForestConfig,
    dataset: &Dataset,
    label: &LabelColumn,
    source: &mut impl RandomSource,
    backend: &dyn ComputeBackend,
    cancel: &CancellationToken,
) -> Result<ForestResult, ForestError> {
    if config.n_trees == 0 {
        return Err(ForestError::InvalidTreeCount {
            n_trees: config.n_trees,
        });
    }
    config.tree.validate()?;
    let sample_size = config.sample_size.unwrap_or(dataset.n_data_rows());
    if sample_size == 0 {
        return Err(ForestError::InvalidSampleCount { count: 0 });
    }
    let frame = TrainingFrame::new(dataset, label)?;

    info!(
        n_trees = config.n_trees,
        n_rows = frame.n_rows(),
        n_features = frame.schema().features().len(),
        n_classes = frame.n_classes(),
        sample_size,
        backend = backend.name(),
        "training forest"
    );

    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| source.next_seed()).collect();
    cancel.check()?;

    let trees = tree_seeds
        .into_par_iter()
        .enumerate()
        .map(|(tree_id, seed)| {
            cancel.check()?;
            let mut rng = SeededSource::new(seed);
            let sample = bootstrap::sample(dataset, sample_size, config.draw_policy, &mut rng)?;
            TreeBuilder::new(&frame, &config.tree, backend, cancel)
                .with_tree_id(tree_id)
                .build(sample)
        })
        .collect::<Result<Vec<_>, _>>()?;
    cancel.check()?;

    let mut columns = ColumnRegistry::from_header(dataset);
    for node in trees.iter().flat_map(Tree::nodes) {
        if let NodeKind::Split {
            test,
            impurity_decrease,
            ..
        } = node.kind()
        {
            columns.record_split(test.column, node.gini().value() - impurity_decrease)?;
        }
    }

    let n_discarded_draws = trees.iter().map(|t| t.sample().n_discarded()).sum();
    debug!(n_trees_trained = trees.len(), n_discarded_draws, "tree training complete");

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(&trees, &frame)?),
        OobMode::Disabled => None,
    };

    let metadata = TrainingMetadata {
        n_trees: trees.len(),
        n_rows: frame.n_rows(),
        n_features: frame.schema().features().len(),
        n_classes: frame.n_classes(),
        sample_size,
        n_discarded_draws,
    };

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        "forest training complete"
    );

    let forest = Forest {
        trees,
        schema: frame.schema().clone(),
        columns,
    };
    Ok(ForestResult::new(forest, oob_score, metadata))
}
