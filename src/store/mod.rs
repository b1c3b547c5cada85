//! Row store abstraction for the ingress log.
//!
//! The pipeline treats a sheet-like tabular store as its only persistent
//! state. The store offers whole-table reads, appends, coordinate cell
//! updates, and whole-table overwrites. There is no uniqueness constraint
//! and no read-after-write guarantee across processes; `overwrite_table`
//! is last-writer-wins. Callers that need mutual exclusion take the store
//! lock for the duration of a read-modify-write cycle.

pub mod file;
pub mod table;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileRowStore;
pub use table::Table;

/// Errors surfaced by a row store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column not found in table '{table}': {column}")]
    ColumnNotFound { table: String, column: String },

    #[error("store lock unavailable: {0}")]
    LockUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt table data: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A single cell update addressed by row index and column name.
///
/// Row indices are data-row indices: 0 is the first row below the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub column: String,
    pub value: String,
}

/// Abstract row-oriented table store.
///
/// Each call is one atomic store-level operation; multi-call workflows built
/// on top of this trait are not atomic.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Read a whole table. An absent table reads as an empty `Table`.
    /// Rows are normalized to the header width (padded or truncated).
    async fn read_table(&self, table: &str) -> Result<Table, StoreError>;

    /// Append rows to the end of a table. No duplicate detection.
    async fn append_rows(&self, table: &str, rows: Vec<Vec<String>>) -> Result<(), StoreError>;

    /// Replace the entire table body. Last writer wins on concurrent calls.
    async fn overwrite_table(&self, table: &str, data: &Table) -> Result<(), StoreError>;

    /// Apply coordinate cell updates in one call.
    async fn update_cells(&self, table: &str, updates: &[CellUpdate]) -> Result<(), StoreError>;

    /// Column-name to index map for a table's header.
    async fn schema_index(&self, table: &str) -> Result<HashMap<String, usize>, StoreError> {
        Ok(self.read_table(table).await?.schema_index())
    }
}
