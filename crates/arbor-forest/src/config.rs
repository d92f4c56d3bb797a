//! Configuration builder for forest training.

use crate::backend::{BackendKind, ComputeBackend};
use crate::bootstrap::{DrawPolicy, RandomSource, SeededSource};
use crate::cancel::CancellationToken;
use crate::dataset::Dataset;
use crate::error::ForestError;
use crate::forest::train;
use crate::result::ForestResult;
use crate::schema::LabelColumn;
use crate::tree::TreeConfig;

/// Whether to compute out-of-bag evaluation during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OobMode {
    /// Compute OOB accuracy and confusion matrix.
    Enabled,
    /// Skip OOB evaluation.
    #[default]
    Disabled,
}

/// Configuration for forest training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter               | Default                    |
/// |-------------------------|----------------------------|
/// | `max_depth`             | `None`                     |
/// | `min_samples_split`     | 2                          |
/// | `min_samples_leaf`      | 1                          |
/// | `min_impurity_decrease` | 0.0                        |
/// | `sample_size`           | `None` (one per data row)  |
/// | `draw_policy`           | `Discard`                  |
/// | `backend`               | `Sequential`               |
/// | `seed`                  | 42                         |
/// | `oob_mode`              | `Disabled`                 |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) tree: TreeConfig,
    pub(crate) sample_size: Option<usize>,
    pub(crate) draw_policy: DrawPolicy,
    pub(crate) backend: BackendKind,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
}

impl ForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, ForestError> {
        if n_trees == 0 {
            return Err(ForestError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            tree: TreeConfig::new(),
            sample_size: None,
            draw_policy: DrawPolicy::Discard,
            backend: BackendKind::Sequential,
            seed: 42,
            oob_mode: OobMode::Disabled,
        })
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.tree = self.tree.with_max_depth(max_depth);
        self
    }

    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.tree = self.tree.with_min_samples_split(min_samples_split);
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.tree = self.tree.with_min_samples_leaf(min_samples_leaf);
        self
    }

    #[must_use]
    pub fn with_min_impurity_decrease(mut self, min_impurity_decrease: f64) -> Self {
        self.tree = self.tree.with_min_impurity_decrease(min_impurity_decrease);
        self
    }

    /// Replace every per-tree limit at once.
    #[must_use]
    pub fn with_tree_config(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    /// Set the number of draws per bootstrap sample. `None` draws once per
    /// data row.
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.sample_size = sample_size;
        self
    }

    #[must_use]
    pub fn with_draw_policy(mut self, draw_policy: DrawPolicy) -> Self {
        self.draw_policy = draw_policy;
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the seed of the master random source.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub fn tree_config(&self) -> &TreeConfig {
        &self.tree
    }

    #[must_use]
    pub fn sample_size(&self) -> Option<usize> {
        self.sample_size
    }

    #[must_use]
    pub fn draw_policy(&self) -> DrawPolicy {
        self.draw_policy
    }

    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Train a forest with the configured seed and backend.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::InvalidLabelColumn`] | `label` does not resolve to a non-id column |
    /// | [`ForestError::InvalidSampleCount`] | `sample_size` is `Some(0)` |
    /// | [`ForestError::NoSampleableRows`] | no row id can be drawn |
    /// | tree limit errors | see [`TreeConfig::validate`] |
    /// | [`ForestError::OobEvaluationFailed`] | OOB enabled but no row is out of bag |
    pub fn fit(&self, dataset: &Dataset, label: &LabelColumn) -> Result<ForestResult, ForestError> {
        let mut source = SeededSource::new(self.seed);
        self.fit_with(
            dataset,
            label,
            &mut source,
            self.backend.backend(),
            &CancellationToken::new(),
        )
    }

    /// Train a forest with a caller-supplied random source, backend, and
    /// cancellation token. The configured seed and backend kind are ignored.
    ///
    /// # Errors
    ///
    /// As [`ForestConfig::fit`], plus [`ForestError::Cancelled`] if `cancel`
    /// fires before training finishes.
    pub fn fit_with(
        &self,
        dataset: &Dataset,
        label: &LabelColumn,
        source: &mut impl RandomSource,
        backend: &dyn ComputeBackend,
        cancel: &CancellationToken,
    ) -> Result<ForestResult, ForestError> {
        train(self, dataset, label, source, backend, cancel)
    }
}
