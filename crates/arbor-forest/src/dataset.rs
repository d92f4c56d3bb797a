use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::error::ForestError;

/// Row identifier reserved to mean "no row". Rows carrying it are never
/// sampled and never indexed.
pub const SENTINEL_ROW_ID: &str = "0";

/// How a column's values are compared during split search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Every value parses as a finite number; split on thresholds.
    Numeric,
    /// Any other column; split on equality with one level.
    Categorical,
}

/// In-memory table of string fields with a header row and a row-id index.
///
/// Column 0 holds the row identifier. Rows are stored in file order; a row's
/// *position* is its zero-based index among the data rows (the header
/// excluded).
#[derive(Debug, Clone)]
pub struct Dataset {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    id_index: HashMap<String, usize>,
    kinds: Vec<ColumnKind>,
}

impl Dataset {
    /// Build a dataset from raw records, the first of which is the header.
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |---|---|
    /// | No records, or a header with no data rows | [`ForestError::EmptySource`] |
    /// | Header with zero fields | [`ForestError::ZeroColumns`] |
    /// | Row width differs from header | [`ForestError::RaggedRow`] |
    /// | Two data rows share an id | [`ForestError::DuplicateRowId`] |
    #[instrument(skip_all, fields(n_records = records.len()))]
    pub fn from_records(records: Vec<Vec<String>>) -> Result<Self, ForestError> {
        let mut records = records.into_iter();
        let header = records.next().ok_or(ForestError::EmptySource)?;
        if header.is_empty() {
            return Err(ForestError::ZeroColumns);
        }
        let n_columns = header.len();

        let mut rows: Vec<Vec<String>> = Vec::with_capacity(records.len());
        let mut id_index = HashMap::with_capacity(records.len());
        for (offset, row) in records.enumerate() {
            let row_index = offset + 1;
            if row.len() != n_columns {
                return Err(ForestError::RaggedRow {
                    row_index,
                    expected: n_columns,
                    got: row.len(),
                });
            }
            let id = &row[0];
            if id != SENTINEL_ROW_ID {
                if let Some(&first) = id_index.get(id) {
                    return Err(ForestError::DuplicateRowId {
                        id: id.clone(),
                        first_row: first + 1,
                        second_row: row_index,
                    });
                }
                id_index.insert(id.clone(), rows.len());
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Err(ForestError::EmptySource);
        }

        let kinds = (0..n_columns)
            .map(|column| infer_kind(rows.iter().map(|row| row[column].as_str())))
            .collect::<Vec<_>>();

        debug!(
            n_rows = rows.len(),
            n_columns,
            n_indexed = id_index.len(),
            "dataset loaded"
        );

        Ok(Self {
            header,
            rows,
            id_index,
            kinds,
        })
    }

    /// Number of rows including the header.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }

    /// Number of data rows (header excluded).
    #[must_use]
    pub fn n_data_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of header fields.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Header name of a column.
    #[must_use]
    pub fn column_name(&self, column: usize) -> Option<&str> {
        self.header.get(column).map(String::as_str)
    }

    /// Position of the first header field equal to `name`.
    #[must_use]
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Inferred comparison kind of a column.
    #[must_use]
    pub fn column_kind(&self, column: usize) -> Option<ColumnKind> {
        self.kinds.get(column).copied()
    }

    #[must_use]
    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    /// Look up a data row by identifier. The sentinel id never resolves.
    #[must_use]
    pub fn row_by_id(&self, id: &str) -> Option<&[String]> {
        self.position_of(id).map(|position| self.rows[position].as_slice())
    }

    /// Position of the data row carrying `id`.
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.id_index.get(id).copied()
    }

    /// Data row at a position.
    #[must_use]
    pub fn row(&self, position: usize) -> Option<&[String]> {
        self.rows.get(position).map(Vec::as_slice)
    }

    /// Iterate over data rows in file order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Identifier of the data row at a position.
    #[must_use]
    pub fn row_id(&self, position: usize) -> Option<&str> {
        self.rows.get(position).map(|row| row[0].as_str())
    }

    /// Return `true` if the row at `position` can be drawn by the sampler.
    #[must_use]
    pub fn is_sampleable(&self, position: usize) -> bool {
        self.row_id(position).is_some_and(|id| id != SENTINEL_ROW_ID)
    }

    /// Positions of every sampleable row, in file order.
    #[must_use]
    pub fn sampleable_positions(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&p| self.is_sampleable(p))
            .collect()
    }
}

fn infer_kind<'a>(mut values: impl Iterator<Item = &'a str>) -> ColumnKind {
    let all_numeric = values.all(|v| v.trim().parse::<f64>().is_ok_and(f64::is_finite));
    if all_numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}
