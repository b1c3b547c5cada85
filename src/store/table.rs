//! In-memory table value type shared by every row store.
//!
//! A table mirrors one sheet of the ingress log: the first physical row is
//! the header and defines column order, every data row is a vector of string
//! cells aligned to that header.

use std::collections::HashMap;

use tracing::warn;

/// One log table: header plus data rows, all cells are strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names, in physical order
    pub header: Vec<String>,

    /// Data rows, each aligned to `header`
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn with_header<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// A table with no header and no rows (an absent or blank log)
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|c| c == column)
    }

    /// Column-name to index map (the store schema index)
    pub fn schema_index(&self) -> HashMap<String, usize> {
        self.header
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect()
    }

    /// Cell value by row index and column name, if both exist
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    /// Normalize every row to the header width.
    ///
    /// Short rows are right-padded with empty strings, long rows truncated.
    /// Both cases emit a diagnostic; neither fails the read.
    pub fn normalize(&mut self, table_name: &str) {
        let width = self.header.len();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if row.len() < width {
                warn!(
                    table = table_name,
                    row = i + 2, // physical row number, header is row 1
                    have = row.len(),
                    want = width,
                    "row shorter than header, padding"
                );
                row.resize(width, String::new());
            } else if row.len() > width {
                warn!(
                    table = table_name,
                    row = i + 2,
                    have = row.len(),
                    want = width,
                    "row longer than header, truncating"
                );
                row.truncate(width);
            }
        }
    }

    /// Add a column with the given default value if it is not present.
    /// Returns true when the column was added.
    pub fn ensure_column(&mut self, column: &str, default: &str) -> bool {
        if self.column_index(column).is_some() {
            return false;
        }
        self.header.push(column.to_string());
        for row in &mut self.rows {
            row.push(default.to_string());
        }
        true
    }

    /// Extend this table's header with any columns it is missing, padding
    /// existing rows with empty cells. Used when appending merged rows whose
    /// schema is wider than the log on disk.
    pub fn extend_columns<'a>(&mut self, columns: impl IntoIterator<Item = &'a str>) {
        for column in columns {
            self.ensure_column(column, "");
        }
    }

    /// Append a row given as (column, value) pairs; unknown columns are
    /// ignored, missing columns become empty cells.
    pub fn push_record(&mut self, record: &HashMap<String, String>) {
        let row = self
            .header
            .iter()
            .map(|c| record.get(c).cloned().unwrap_or_default())
            .collect();
        self.rows.push(row);
    }

    /// View one row as a (column -> value) record
    pub fn record(&self, row: usize) -> Option<HashMap<String, String>> {
        let row = self.rows.get(row)?;
        Some(
            self.header
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }
}
