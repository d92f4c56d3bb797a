use std::fmt;

use tracing::{debug, instrument};

use crate::dataset::{ColumnKind, Dataset};
use crate::error::ForestError;
use crate::node::ColumnIndex;

/// Which column of a dataset holds the class label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LabelColumn {
    /// The rightmost header field.
    #[default]
    Last,
    /// A zero-based header position.
    Index(usize),
    /// The first header field with this name.
    Name(String),
}

impl LabelColumn {
    fn resolve(&self, dataset: &Dataset) -> Result<usize, ForestError> {
        let n_columns = dataset.column_count();
        let column = match self {
            Self::Last => n_columns - 1,
            Self::Index(index) => *index,
            Self::Name(name) => {
                dataset
                    .column_position(name)
                    .ok_or_else(|| ForestError::InvalidLabelColumn {
                        column: self.to_string(),
                        reason: "no header field has this name",
                    })?
            }
        };
        if column >= n_columns {
            return Err(ForestError::InvalidLabelColumn {
                column: self.to_string(),
                reason: "index is past the last column",
            });
        }
        if column == 0 {
            return Err(ForestError::InvalidLabelColumn {
                column: self.to_string(),
                reason: "column 0 holds row identifiers",
            });
        }
        Ok(column)
    }
}

impl fmt::Display for LabelColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Last => write!(f, "last"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// An encoded field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Parsed value of a numeric column.
    Number(f64),
    /// Level code of a categorical column; `None` for a level unseen in training.
    Level(Option<u32>),
}

/// Anything that can supply encoded field values by column.
pub trait FieldSource {
    /// Encoded value of `column`, or `None` if the column does not exist.
    fn field(&self, column: ColumnIndex) -> Option<FieldValue>;
}

impl FieldSource for [FieldValue] {
    fn field(&self, column: ColumnIndex) -> Option<FieldValue> {
        self.get(column.index()).copied()
    }
}

impl FieldSource for Vec<FieldValue> {
    fn field(&self, column: ColumnIndex) -> Option<FieldValue> {
        self.as_slice().field(column)
    }
}

/// Column layout and value encodings learned from a training dataset.
///
/// Categorical levels and class labels are stored sorted, so level codes and
/// class indices follow a stable order: numeric order when every value
/// parses, lexicographic order otherwise.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Schema {
    names: Vec<String>,
    kinds: Vec<ColumnKind>,
    levels: Vec<Vec<String>>,
    label_column: ColumnIndex,
    classes: Vec<String>,
    features: Vec<ColumnIndex>,
}

impl Schema {
    fn learn(dataset: &Dataset, label_column: usize) -> Self {
        let n_columns = dataset.column_count();
        let levels = (0..n_columns)
            .map(|column| match dataset.kinds()[column] {
                ColumnKind::Numeric => Vec::new(),
                ColumnKind::Categorical => sorted_distinct(dataset, column, false),
            })
            .collect();
        let numeric_label = dataset.kinds()[label_column] == ColumnKind::Numeric;
        let classes = sorted_distinct(dataset, label_column, numeric_label);
        let features = (1..n_columns)
            .filter(|&c| c != label_column)
            .map(ColumnIndex::new)
            .collect();

        Self {
            names: dataset.header().to_vec(),
            kinds: dataset.kinds().to_vec(),
            levels,
            label_column: ColumnIndex::new(label_column),
            classes,
            features,
        }
    }

    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn column_name(&self, column: ColumnIndex) -> Option<&str> {
        self.names.get(column.index()).map(String::as_str)
    }

    #[must_use]
    pub fn column_kind(&self, column: ColumnIndex) -> Option<ColumnKind> {
        self.kinds.get(column.index()).copied()
    }

    #[must_use]
    pub fn label_column(&self) -> ColumnIndex {
        self.label_column
    }

    /// Class labels in class-index order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Label text of a class index.
    #[must_use]
    pub fn class_name(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }

    /// Columns eligible for splitting: every column except the id and label.
    #[must_use]
    pub fn features(&self) -> &[ColumnIndex] {
        &self.features
    }

    /// Sorted levels of a categorical column (empty for numeric columns).
    #[must_use]
    pub fn levels(&self, column: ColumnIndex) -> &[String] {
        self.levels
            .get(column.index())
            .map_or(&[][..], Vec::as_slice)
    }

    /// Encode a raw record for prediction.
    ///
    /// Only feature columns are encoded; the id and label fields are ignored
    /// and may hold anything.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::RecordLengthMismatch`] if the record width
    /// differs from the header, or [`ForestError::UnparseableField`] if a
    /// numeric feature field is not a finite number.
    pub fn encode<S: AsRef<str>>(&self, record: &[S]) -> Result<Vec<FieldValue>, ForestError> {
        if record.len() != self.n_columns() {
            return Err(ForestError::RecordLengthMismatch {
                expected: self.n_columns(),
                got: record.len(),
            });
        }
        let mut encoded = vec![FieldValue::Level(None); record.len()];
        for &column in &self.features {
            let raw = record[column.index()].as_ref();
            encoded[column.index()] = match self.kinds[column.index()] {
                ColumnKind::Numeric => FieldValue::Number(parse_finite(raw).ok_or_else(|| {
                    ForestError::UnparseableField {
                        column: column.index(),
                        raw: raw.to_owned(),
                    }
                })?),
                ColumnKind::Categorical => FieldValue::Level(self.level_code(column, raw)),
            };
        }
        Ok(encoded)
    }

    fn level_code(&self, column: ColumnIndex, raw: &str) -> Option<u32> {
        self.levels(column)
            .binary_search_by(|level| level.as_str().cmp(raw))
            .ok()
            .and_then(|code| u32::try_from(code).ok())
    }

    fn class_of(&self, raw: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == raw)
    }
}

/// One encoded feature column, stored column-major for split scans.
#[derive(Debug, Clone)]
enum EncodedColumn {
    Numeric(Vec<f64>),
    Categorical(Vec<u32>),
    Skipped,
}

/// A dataset encoded for training: class indices per row plus column-major
/// feature values, indexed by the same row positions as the [`Dataset`].
#[derive(Debug, Clone)]
pub struct TrainingFrame {
    schema: Schema,
    labels: Vec<usize>,
    columns: Vec<EncodedColumn>,
}

impl TrainingFrame {
    /// Encode `dataset` for training, taking class labels from `label`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidLabelColumn`] if `label` does not
    /// resolve to a column other than the id column.
    #[instrument(skip_all, fields(label = %label))]
    pub fn new(dataset: &Dataset, label: &LabelColumn) -> Result<Self, ForestError> {
        let label_column = label.resolve(dataset)?;
        let schema = Schema::learn(dataset, label_column);

        let labels = dataset
            .rows()
            .map(|row| {
                schema.class_of(&row[label_column]).ok_or_else(|| {
                    ForestError::invariant(format!(
                        "label {:?} missing from learned classes",
                        row[label_column]
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = vec![EncodedColumn::Skipped; schema.n_columns()];
        for &column in schema.features() {
            let values = dataset.rows().map(|row| row[column.index()].as_str());
            columns[column.index()] = match schema.kinds[column.index()] {
                ColumnKind::Numeric => EncodedColumn::Numeric(
                    values
                        .map(|raw| parse_finite(raw).unwrap_or(f64::NAN))
                        .collect(),
                ),
                ColumnKind::Categorical => EncodedColumn::Categorical(
                    values
                        .map(|raw| {
                            schema.level_code(column, raw).ok_or_else(|| {
                                ForestError::invariant(format!(
                                    "level {raw:?} missing from column {column}"
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
        }

        debug!(
            n_rows = labels.len(),
            n_features = schema.features().len(),
            n_classes = schema.n_classes(),
            "training frame encoded"
        );

        Ok(Self {
            schema,
            labels,
            columns,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.schema.n_classes()
    }

    /// Class index of every row, by position.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Encoded value of one cell, or `None` for a non-feature column or an
    /// out-of-range position.
    #[must_use]
    pub fn value(&self, position: usize, column: ColumnIndex) -> Option<FieldValue> {
        match self.columns.get(column.index())? {
            EncodedColumn::Numeric(values) => values.get(position).copied().map(FieldValue::Number),
            EncodedColumn::Categorical(codes) => {
                codes.get(position).map(|&code| FieldValue::Level(Some(code)))
            }
            EncodedColumn::Skipped => None,
        }
    }

    /// View of one training row as a [`FieldSource`].
    #[must_use]
    pub fn row(&self, position: usize) -> FrameRow<'_> {
        FrameRow {
            frame: self,
            position,
        }
    }
}

/// A borrowed training row.
#[derive(Debug, Clone, Copy)]
pub struct FrameRow<'a> {
    frame: &'a TrainingFrame,
    position: usize,
}

impl FieldSource for FrameRow<'_> {
    fn field(&self, column: ColumnIndex) -> Option<FieldValue> {
        self.frame.value(self.position, column)
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn sorted_distinct(dataset: &Dataset, column: usize, numeric: bool) -> Vec<String> {
    let mut values = dataset
        .rows()
        .map(|row| row[column].clone())
        .collect::<Vec<_>>();
    if numeric {
        values.sort_by(|a, b| match (parse_finite(a), parse_finite(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
            _ => a.cmp(b),
        });
    } else {
        values.sort();
    }
    values.dedup();
    values
}
