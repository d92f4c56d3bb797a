use crate::dataset::{ColumnKind, Dataset};
use crate::error::ForestError;
use crate::node::ColumnIndex;

/// Per-column metadata derived from the dataset header.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Column {
    index: ColumnIndex,
    name: String,
    kind: ColumnKind,
    impurity_estimate: f64,
    n_splits: usize,
}

impl Column {
    #[must_use]
    pub fn index(&self) -> ColumnIndex {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Mean weighted child impurity over every split chosen on this column,
    /// or `None` if no tree split on it.
    #[must_use]
    pub fn impurity_estimate(&self) -> Option<f64> {
        (self.n_splits > 0).then_some(self.impurity_estimate)
    }

    /// Number of split nodes, across all trees, that test this column.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }
}

/// Ordered collection of [`Column`]s, one per header field.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
}

impl ColumnRegistry {
    /// Create one entry per header field, in header order.
    #[must_use]
    pub fn from_header(dataset: &Dataset) -> Self {
        let columns = dataset
            .header()
            .iter()
            .zip(dataset.kinds())
            .enumerate()
            .map(|(i, (name, &kind))| Column {
                index: ColumnIndex::new(i),
                name: name.clone(),
                kind,
                impurity_estimate: 0.0,
                n_splits: 0,
            })
            .collect();
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn get(&self, index: ColumnIndex) -> Option<&Column> {
        self.columns.get(index.index())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Fold one chosen split's weighted impurity into the column's running mean.
    pub(crate) fn record_split(
        &mut self,
        index: ColumnIndex,
        impurity: f64,
    ) -> Result<(), ForestError> {
        let column = self.columns.get_mut(index.index()).ok_or_else(|| {
            ForestError::invariant(format!("split on unregistered column {index}"))
        })?;
        column.n_splits += 1;
        column.impurity_estimate += (impurity - column.impurity_estimate) / column.n_splits as f64;
        Ok(())
    }
}

/// Set of columns already split on along one root-to-node path.
///
/// Scopes are immutable once handed to a subtree: marking a column yields a
/// new child scope, so sibling subtrees never observe each other's choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathScope {
    used: Vec<bool>,
}

impl PathScope {
    /// An empty scope over `n_columns` columns.
    #[must_use]
    pub fn new(n_columns: usize) -> Self {
        Self {
            used: vec![false; n_columns],
        }
    }

    /// Return a child scope with `column` marked as used.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if `column` is out of range.
    pub fn mark_used(&self, column: ColumnIndex) -> Result<Self, ForestError> {
        let mut child = self.clone();
        let slot = child.used.get_mut(column.index()).ok_or_else(|| {
            ForestError::invariant(format!(
                "column {column} outside scope of {} columns",
                self.used.len()
            ))
        })?;
        *slot = true;
        Ok(child)
    }

    /// Return `true` if `column` was split on along this path.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if `column` is out of range.
    pub fn is_used(&self, column: ColumnIndex) -> Result<bool, ForestError> {
        self.used.get(column.index()).copied().ok_or_else(|| {
            ForestError::invariant(format!(
                "column {column} outside scope of {} columns",
                self.used.len()
            ))
        })
    }

    /// The subset of `candidates` not yet used on this path, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvariantViolation`] if any candidate is out of range.
    pub fn available(&self, candidates: &[ColumnIndex]) -> Result<Vec<ColumnIndex>, ForestError> {
        let mut out = Vec::with_capacity(candidates.len());
        for &column in candidates {
            if !self.is_used(column)? {
                out.push(column);
            }
        }
        Ok(out)
    }
}
