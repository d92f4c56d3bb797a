//! Delimited-text table reader.

use std::path::{Path, PathBuf};

use arbor_forest::Dataset;
use tracing::{debug, info, instrument};

use crate::IoError;

/// Reads a delimited text file into a [`Dataset`].
///
/// Expected layout:
/// - First record is the header (column 0 holds the row-id column name)
/// - `id,feature1,...,featureN,label`
/// - Every data record has as many fields as the header
///
/// Fields are kept as raw strings; column kinds are inferred by the
/// [`Dataset`] itself.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed record (e.g. bad quoting or encoding) |
/// | [`IoError::InvalidDelimiter`] | Delimiter is not ASCII |
/// | [`IoError::Format`] | Empty file, zero columns, ragged or duplicate-id rows |
#[derive(Debug, Clone)]
pub struct TableReader {
    path: PathBuf,
    delimiter: char,
}

impl TableReader {
    /// Create a comma-delimited reader for the given file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: ',',
        }
    }

    /// Set the field delimiter. Validated when [`TableReader::read`] runs.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Read and validate the file, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display(), delimiter = ?self.delimiter))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(IoError::InvalidDelimiter {
                delimiter: self.delimiter,
            })?;

        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // The header is read as an ordinary record and ragged rows are let
        // through, so that Dataset validation reports them with row indices.
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;
            records.push(record.iter().map(String::from).collect::<Vec<String>>());
        }
        debug!(n_records = records.len(), "tokenized table");

        let dataset = Dataset::from_records(records).map_err(|e| IoError::Format {
            path: self.path.clone(),
            source: e,
        })?;

        info!(
            n_rows = dataset.n_data_rows(),
            n_columns = dataset.column_count(),
            "table loaded"
        );
        Ok(dataset)
    }
}

/// Load a delimited table from `path`.
///
/// # Errors
///
/// See [`TableReader`].
pub fn load(path: &Path, delimiter: char) -> Result<Dataset, IoError> {
    TableReader::new(path).with_delimiter(delimiter).read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_forest::{ColumnKind, ForestError};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_table(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_valid_table() {
        let f = write_table("id,A,B,label\n1,x,1,no\n2,x,2,no\n3,y,1,yes\n4,y,2,yes\n");
        let ds = TableReader::new(f.path()).read().unwrap();
        assert_eq!(ds.row_count(), 5);
        assert_eq!(ds.n_data_rows(), 4);
        assert_eq!(ds.column_count(), 4);
        assert_eq!(ds.header(), ["id", "A", "B", "label"]);
        assert_eq!(ds.row_by_id("3").unwrap()[1], "y");
        assert_eq!(ds.column_kind(2), Some(ColumnKind::Numeric));
        assert_eq!(ds.column_kind(1), Some(ColumnKind::Categorical));
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let f = write_table("id,name,label\n1,\"a,b\",p\n2,c,q\n");
        let ds = TableReader::new(f.path()).read().unwrap();
        assert_eq!(ds.row_by_id("1").unwrap()[1], "a,b");
    }

    #[test]
    fn custom_delimiter() {
        let f = write_table("id;x;label\n1;0.5;a\n2;1.5;b\n");
        let ds = load(f.path(), ';').unwrap();
        assert_eq!(ds.column_count(), 3);
        assert_eq!(ds.row_by_id("2").unwrap()[1], "1.5");
    }

    #[test]
    fn non_ascii_delimiter_rejected() {
        let f = write_table("id,x\n1,2\n");
        let err = load(f.path(), '§').unwrap_err();
        assert!(matches!(err, IoError::InvalidDelimiter { delimiter: '§' }));
    }

    #[test]
    fn missing_file_error() {
        let err = TableReader::new(Path::new("/nonexistent/table.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }

    #[test]
    fn empty_file_error() {
        let f = write_table("");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::Format {
                source: ForestError::EmptySource,
                ..
            }
        ));
    }

    #[test]
    fn header_only_error() {
        let f = write_table("id,x,label\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::Format {
                source: ForestError::EmptySource,
                ..
            }
        ));
    }

    #[test]
    fn ragged_row_error() {
        let f = write_table("id,x,label\n1,0.5,a\n2,1.5\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::Format {
                source: ForestError::RaggedRow {
                    row_index: 2,
                    expected: 3,
                    got: 2
                },
                ..
            }
        ));
    }

    #[test]
    fn duplicate_id_error() {
        let f = write_table("id,x,label\n1,0.5,a\n1,1.5,b\n");
        let err = TableReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::Format {
                source: ForestError::DuplicateRowId { .. },
                ..
            }
        ));
    }
}
