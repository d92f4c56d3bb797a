use std::fmt;

use crate::schema::FieldValue;

/// Zero-based column index into the dataset header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ColumnIndex(usize);

impl ColumnIndex {
    /// Create a column index from a zero-based header position.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based header position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ColumnIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a tree's `Vec<Node>` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gini impurity of a row subset, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Return `true` if the subset holds a single class.
    #[must_use]
    pub fn is_pure(self) -> bool {
        self.0 <= f64::EPSILON
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// The comparison value of a split test.
///
/// Numeric columns split on a threshold (`value <= threshold` goes left).
/// Categorical columns split on one level (`value == level` goes left).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub enum SplitValue {
    /// Midpoint threshold on a numeric column.
    Threshold(f64),
    /// Level code on a categorical column.
    Level(u32),
}

/// A column paired with a split value: the test evaluated at an interior node.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SplitTest {
    /// Column tested.
    pub column: ColumnIndex,
    /// Threshold or level compared against.
    pub value: SplitValue,
}

impl SplitTest {
    /// Return `true` if an encoded field is routed to the left child.
    ///
    /// Unseen categorical levels and mismatched encodings take the right
    /// (complement) branch.
    #[must_use]
    pub fn goes_left(&self, field: FieldValue) -> bool {
        match (self.value, field) {
            (SplitValue::Threshold(t), FieldValue::Number(v)) => v <= t,
            (SplitValue::Level(code), FieldValue::Level(Some(level))) => level == code,
            _ => false,
        }
    }
}

impl fmt::Display for SplitTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            SplitValue::Threshold(t) => write!(f, "col[{}] <= {t}", self.column),
            SplitValue::Level(code) => write!(f, "col[{}] == #{code}", self.column),
        }
    }
}

/// Why tree growth stopped at a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The row subset reaching the node was empty.
    EmptySubset,
    /// Every feature column was already used on the path from the root.
    NoColumns,
    /// The node sits at the configured maximum depth.
    MaxDepth,
    /// Fewer rows than `min_samples_split` reached the node.
    MinSamples,
    /// All rows share one class.
    Pure,
    /// No candidate split passed the leaf-size and impurity-decrease filters.
    NoSplit,
}

/// Split or leaf payload of a [`Node`].
#[derive(Debug, Clone, serde::Serialize)]
pub enum NodeKind {
    /// An interior split node.
    Split {
        /// The test routing rows to the children.
        test: SplitTest,
        /// Arena index of the child receiving rows that pass the test.
        left: NodeIndex,
        /// Arena index of the child receiving all other rows.
        right: NodeIndex,
        /// Parent impurity minus the weighted impurity of the children.
        impurity_decrease: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Majority class index (lowest index on ties).
        label: usize,
        /// Normalized class distribution of the rows in this leaf.
        distribution: Vec<f64>,
        /// Stop condition that produced this leaf.
        reason: StopReason,
    },
}

/// A node in a tree arena.
///
/// Children are referenced by [`NodeIndex`]; every node also records the
/// id of the tree that owns it and the dataset row positions that reached it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Node {
    id: NodeIndex,
    tree: usize,
    gini: Impurity,
    rows: Vec<usize>,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn new(
        id: NodeIndex,
        tree: usize,
        gini: Impurity,
        rows: Vec<usize>,
        kind: NodeKind,
    ) -> Self {
        Self {
            id,
            tree,
            gini,
            rows,
            kind,
        }
    }

    /// Arena index of this node inside its tree.
    #[must_use]
    pub fn id(&self) -> NodeIndex {
        self.id
    }

    /// Id of the tree that owns this node.
    #[must_use]
    pub fn tree(&self) -> usize {
        self.tree
    }

    /// Gini impurity of the rows reaching this node.
    #[must_use]
    pub fn gini(&self) -> Impurity {
        self.gini
    }

    /// Dataset row positions (a multiset) that reached this node.
    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Number of rows that reached this node, counting repeats.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// The split test of an interior node.
    #[must_use]
    pub fn test(&self) -> Option<SplitTest> {
        match &self.kind {
            NodeKind::Split { test, .. } => Some(*test),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Left and right children of an interior node.
    #[must_use]
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        match &self.kind {
            NodeKind::Split { left, right, .. } => Some((*left, *right)),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Majority class of a leaf.
    #[must_use]
    pub fn label(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::Leaf { label, .. } => Some(*label),
            NodeKind::Split { .. } => None,
        }
    }
}
