use std::collections::VecDeque;

use tracing::{debug, instrument};

use crate::backend::{ComputeBackend, SequentialBackend};
use crate::bootstrap::BootstrapSample;
use crate::cancel::CancellationToken;
use crate::columns::PathScope;
use crate::error::ForestError;
use crate::node::{Impurity, Node, NodeIndex, NodeKind, StopReason};
use crate::schema::{FieldSource, TrainingFrame};
use crate::split::{SplitEvaluator, TIE_TOLERANCE, class_counts, gini};

/// Growth limits for a single decision tree.
///
/// Construct via [`TreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter               | Default            |
/// |-------------------------|--------------------|
/// | `max_depth`             | `None` (unlimited) |
/// | `min_samples_split`     | 2                  |
/// | `min_samples_leaf`      | 1                  |
/// | `min_impurity_decrease` | 0.0                |
///
/// A column is split on at most once along any root-to-leaf path, so depth
/// is always bounded by the number of feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) min_impurity_decrease: f64,
}

impl TreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_impurity_decrease: 0.0,
        }
    }

    /// Set the maximum tree depth. The root is at depth 0; nodes at
    /// `max_depth` become leaves.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of rows a node needs before a split is attempted.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of rows each child of a split must receive.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the impurity decrease a split must strictly exceed to be kept.
    #[must_use]
    pub fn with_min_impurity_decrease(mut self, min_impurity_decrease: f64) -> Self {
        self.min_impurity_decrease = min_impurity_decrease;
        self
    }

    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    #[must_use]
    pub fn min_impurity_decrease(&self) -> f64 {
        self.min_impurity_decrease
    }

    /// Check every limit.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`ForestError::InvalidMinSamplesSplit`] | `min_samples_split` < 2 |
    /// | [`ForestError::InvalidMinSamplesLeaf`] | `min_samples_leaf` < 1 |
    /// | [`ForestError::InvalidMinImpurityDecrease`] | negative or non-finite threshold |
    pub fn validate(&self) -> Result<(), ForestError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(ForestError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(ForestError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(ForestError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        if !self.min_impurity_decrease.is_finite() || self.min_impurity_decrease < 0.0 {
            return Err(ForestError::InvalidMinImpurityDecrease {
                value: self.min_impurity_decrease,
            });
        }
        Ok(())
    }

    /// Grow one tree over `sample` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`TreeConfig::validate`], or
    /// [`ForestError::InvariantViolation`] if the frame and sample disagree.
    pub fn fit(&self, frame: &TrainingFrame, sample: BootstrapSample) -> Result<Tree, ForestError> {
        TreeBuilder::new(frame, self, &SequentialBackend, &CancellationToken::new()).build(sample)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Grows one tree into a node arena.
///
/// Children are pushed before their parent, so every child index is smaller
/// than its parent's and the root is the last node.
#[derive(Debug)]
pub struct TreeBuilder<'a> {
    frame: &'a TrainingFrame,
    config: &'a TreeConfig,
    evaluator: SplitEvaluator<'a>,
    cancel: &'a CancellationToken,
    tree_id: usize,
    arena: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    #[must_use]
    pub fn new(
        frame: &'a TrainingFrame,
        config: &'a TreeConfig,
        backend: &'a dyn ComputeBackend,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            frame,
            config,
            evaluator: SplitEvaluator::new(frame, backend)
                .with_min_samples_leaf(config.min_samples_leaf),
            cancel,
            tree_id: 0,
            arena: Vec::new(),
        }
    }

    /// Set the id stamped on every node of the tree.
    #[must_use]
    pub fn with_tree_id(mut self, tree_id: usize) -> Self {
        self.tree_id = tree_id;
        self
    }

    /// Grow the tree over the rows of `sample`.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | validation errors | see [`TreeConfig::validate`] |
    /// | [`ForestError::Cancelled`] | the token was cancelled before or during growth |
    /// | [`ForestError::InvariantViolation`] | a sampled row or column is outside the frame |
    #[instrument(skip_all, fields(tree = self.tree_id, n_rows = sample.len()))]
    pub fn build(mut self, sample: BootstrapSample) -> Result<Tree, ForestError> {
        self.config.validate()?;
        if let Some(&row) = sample.rows().iter().find(|&&r| r >= self.frame.n_rows()) {
            return Err(ForestError::invariant(format!(
                "sampled row {row} outside frame of {} rows",
                self.frame.n_rows()
            )));
        }

        let scope = PathScope::new(self.frame.schema().n_columns());
        let root = self.grow(sample.rows().to_vec(), &scope, 0, 0)?;

        let tree = Tree {
            id: self.tree_id,
            nodes: self.arena,
            root,
            sample,
            max_depth: self.config.max_depth,
        };
        debug!(
            n_nodes = tree.n_nodes(),
            n_leaves = tree.n_leaves(),
            depth = tree.depth(),
            "tree built"
        );
        Ok(tree)
    }

    fn grow(
        &mut self,
        rows: Vec<usize>,
        scope: &PathScope,
        depth: usize,
        parent_label: usize,
    ) -> Result<NodeIndex, ForestError> {
        self.cancel.check()?;

        let counts = class_counts(self.frame, &rows);
        let impurity = gini(&counts, rows.len());
        let label = majority(&counts).unwrap_or(parent_label);

        if rows.is_empty() {
            return Ok(self.push_leaf(rows, impurity, &counts, label, StopReason::EmptySubset));
        }
        let available = scope.available(self.frame.schema().features())?;
        if available.is_empty() {
            return Ok(self.push_leaf(rows, impurity, &counts, label, StopReason::NoColumns));
        }
        if self.config.max_depth.is_some_and(|max| depth >= max) {
            return Ok(self.push_leaf(rows, impurity, &counts, label, StopReason::MaxDepth));
        }
        if rows.len() < self.config.min_samples_split {
            return Ok(self.push_leaf(rows, impurity, &counts, label, StopReason::MinSamples));
        }
        if impurity.is_pure() {
            return Ok(self.push_leaf(rows, impurity, &counts, label, StopReason::Pure));
        }

        let Some(best) = self.evaluator.best_split(&rows, &available)? else {
            return Ok(self.push_leaf(rows, impurity, &counts, label, StopReason::NoSplit));
        };
        let impurity_decrease = impurity.value() - best.impurity;
        if impurity_decrease <= self.config.min_impurity_decrease + TIE_TOLERANCE {
            return Ok(self.push_leaf(rows, impurity, &counts, label, StopReason::NoSplit));
        }

        let (left_rows, right_rows) = self.evaluator.partition(&rows, &best.test)?;
        if left_rows.is_empty() || right_rows.is_empty() {
            return Err(ForestError::invariant(format!(
                "split {} sent every row to one side",
                best.test
            )));
        }

        let child_scope = scope.mark_used(best.test.column)?;
        let left = self.grow(left_rows, &child_scope, depth + 1, label)?;
        let right = self.grow(right_rows, &child_scope, depth + 1, label)?;

        let id = NodeIndex::new(self.arena.len());
        self.arena.push(Node::new(
            id,
            self.tree_id,
            impurity,
            rows,
            NodeKind::Split {
                test: best.test,
                left,
                right,
                impurity_decrease,
            },
        ));
        Ok(id)
    }

    fn push_leaf(
        &mut self,
        rows: Vec<usize>,
        impurity: Impurity,
        counts: &[usize],
        label: usize,
        reason: StopReason,
    ) -> NodeIndex {
        let total = rows.len() as f64;
        let distribution = if rows.is_empty() {
            vec![0.0; counts.len()]
        } else {
            counts.iter().map(|&c| c as f64 / total).collect()
        };
        let id = NodeIndex::new(self.arena.len());
        self.arena.push(Node::new(
            id,
            self.tree_id,
            impurity,
            rows,
            NodeKind::Leaf {
                label,
                distribution,
                reason,
            },
        ));
        id
    }
}

/// Index of the largest count, lowest index on ties; `None` if all are zero.
pub(crate) fn majority(counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (class, &count) in counts.iter().enumerate() {
        if count > 0 && best.is_none_or(|(_, c)| count > c) {
            best = Some((class, count));
        }
    }
    best.map(|(class, _)| class)
}

/// A grown decision tree.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Tree {
    id: usize,
    nodes: Vec<Node>,
    root: NodeIndex,
    #[serde(skip)]
    sample: BootstrapSample,
    max_depth: Option<usize>,
}

impl Tree {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// All nodes, in arena order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if `index` is outside the arena.
    pub fn node(&self, index: NodeIndex) -> Result<&Node, ForestError> {
        self.nodes.get(index.index()).ok_or_else(|| {
            ForestError::invariant(format!(
                "tree {} has no node {index} ({} nodes)",
                self.id,
                self.nodes.len()
            ))
        })
    }

    /// The bootstrap sample this tree was grown on.
    #[must_use]
    pub fn sample(&self) -> &BootstrapSample {
        &self.sample
    }

    /// The configured depth limit.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Depth of the deepest leaf; a single-leaf tree has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut queue = VecDeque::from([(self.root, 0usize)]);
        while let Some((index, depth)) = queue.pop_front() {
            deepest = deepest.max(depth);
            if let Some((left, right)) = self.nodes.get(index.index()).and_then(Node::children) {
                queue.push_back((left, depth + 1));
                queue.push_back((right, depth + 1));
            }
        }
        deepest
    }

    /// The leaf an encoded record lands in.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] on a dangling child index,
    /// a cycle, or a record missing the tested column.
    pub fn leaf<F: FieldSource + ?Sized>(&self, record: &F) -> Result<&Node, ForestError> {
        let mut node = self.node(self.root)?;
        for _ in 0..=self.nodes.len() {
            match node.kind() {
                NodeKind::Leaf { .. } => return Ok(node),
                NodeKind::Split {
                    test, left, right, ..
                } => {
                    let value = record.field(test.column).ok_or_else(|| {
                        ForestError::invariant(format!("record has no column {}", test.column))
                    })?;
                    node = self.node(if test.goes_left(value) { *left } else { *right })?;
                }
            }
        }
        Err(ForestError::invariant(format!(
            "tree {} traversal did not reach a leaf",
            self.id
        )))
    }

    /// Majority class of the leaf an encoded record lands in.
    ///
    /// # Errors
    ///
    /// See [`Tree::leaf`].
    pub fn predict<F: FieldSource + ?Sized>(&self, record: &F) -> Result<usize, ForestError> {
        let leaf = self.leaf(record)?;
        leaf.label()
            .ok_or_else(|| ForestError::invariant("traversal stopped at a split node"))
    }

    #[cfg(test)]
    pub(crate) fn from_parts(nodes: Vec<Node>, root: NodeIndex, sample: BootstrapSample) -> Self {
        Self {
            id: 0,
            nodes,
            root,
            sample,
            max_depth: None,
        }
    }
}
