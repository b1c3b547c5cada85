//! Stage log: one row-store table per pipeline stage.
//!
//! Binds a table name to its record-identifier column and stage flag
//! column, and gives the engines a small contract: whole-table reads,
//! appends, and the idempotent flag flip used to back-patch merge state.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::FLAG_SET;
use crate::store::{CellUpdate, RowStore, Table};

/// A handle to one stage's log table
pub struct StageLog<'a, S: RowStore> {
    store: &'a S,
    table: &'a str,
    id_column: &'a str,
    flag_column: &'a str,
}

impl<'a, S: RowStore> StageLog<'a, S> {
    pub fn new(store: &'a S, table: &'a str, id_column: &'a str, flag_column: &'a str) -> Self {
        Self {
            store,
            table,
            id_column,
            flag_column,
        }
    }

    pub fn table(&self) -> &str {
        self.table
    }

    pub fn id_column(&self) -> &str {
        self.id_column
    }

    pub fn flag_column(&self) -> &str {
        self.flag_column
    }

    /// Read the whole log.
    ///
    /// A non-empty log missing its id column is schema drift: the read is a
    /// hard stop rather than a guess at column positions.
    pub async fn read_all(&self) -> Result<Table> {
        let data = self
            .store
            .read_table(self.table)
            .await
            .with_context(|| format!("failed to read log '{}'", self.table))?;

        if !data.header.is_empty() && data.column_index(self.id_column).is_none() {
            anyhow::bail!(
                "log '{}' is missing its id column '{}'",
                self.table,
                self.id_column
            );
        }

        Ok(data)
    }

    /// Append rows to the log. Duplicate identifiers are the caller's
    /// responsibility; the log itself has no uniqueness constraint.
    pub async fn append(&self, rows: Vec<Vec<String>>) -> Result<()> {
        self.store
            .append_rows(self.table, rows)
            .await
            .with_context(|| format!("failed to append to log '{}'", self.table))
    }

    /// Replace the whole log body
    pub async fn overwrite(&self, data: &Table) -> Result<()> {
        self.store
            .overwrite_table(self.table, data)
            .await
            .with_context(|| format!("failed to overwrite log '{}'", self.table))
    }

    /// Make sure the flag column physically exists, rewriting the log once
    /// if it predates the column. Rows gain an empty cell, which parses as
    /// unmerged.
    pub async fn ensure_flag_column(&self) -> Result<()> {
        let mut data = self.read_all().await?;
        if data.header.is_empty() {
            return Ok(());
        }
        if data.ensure_column(self.flag_column, "") {
            warn!(
                table = self.table,
                column = self.flag_column,
                "flag column missing, adding it"
            );
            self.overwrite(&data).await?;
        }
        Ok(())
    }

    /// Flip the stage flag to the terminal value for every row whose
    /// identifier is in `ids`.
    ///
    /// Rows already at the terminal value are left untouched, which makes
    /// the operation idempotent under retry: running it twice produces the
    /// same table state as running it once. Returns the number of rows
    /// actually updated.
    pub async fn set_flag(&self, ids: &HashSet<String>) -> Result<usize> {
        let data = self.read_all().await?;
        if data.is_empty() {
            info!(table = self.table, "no rows to update");
            return Ok(0);
        }

        let id_idx = data
            .column_index(self.id_column)
            .with_context(|| format!("log '{}' has no column '{}'", self.table, self.id_column))?;
        let flag_idx = data.column_index(self.flag_column).with_context(|| {
            format!("log '{}' has no column '{}'", self.table, self.flag_column)
        })?;

        let mut updates = Vec::new();
        for (row_idx, row) in data.rows.iter().enumerate() {
            if !ids.contains(&row[id_idx]) {
                continue;
            }
            if row[flag_idx] == FLAG_SET {
                continue;
            }
            updates.push(CellUpdate {
                row: row_idx,
                column: self.flag_column.to_string(),
                value: FLAG_SET.to_string(),
            });
        }

        if updates.is_empty() {
            info!(table = self.table, "no flag updates needed");
            return Ok(0);
        }

        let count = updates.len();
        self.store
            .update_cells(self.table, &updates)
            .await
            .with_context(|| format!("failed to update flags in log '{}'", self.table))?;
        info!(table = self.table, rows = count, "flags updated");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileRowStore;
    use tempfile::TempDir;

    async fn store_with(table: &str, data: &Table) -> (FileRowStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = FileRowStore::open(temp.path()).await.unwrap();
        store.overwrite_table(table, data).await.unwrap();
        (store, temp)
    }

    fn log_table() -> Table {
        Table {
            header: vec!["gd_transcript_file_id".into(), "merge_status_tag".into()],
            rows: vec![
                vec!["F1".into(), "0".into()],
                vec!["F2".into(), "1".into()],
                vec!["F1".into(), "0".into()],
            ],
        }
    }

    #[tokio::test]
    async fn test_set_flag_hits_every_matching_row() {
        let (store, _temp) = store_with("tag_transcripts", &log_table()).await;
        let log = StageLog::new(
            &store,
            "tag_transcripts",
            "gd_transcript_file_id",
            "merge_status_tag",
        );

        let ids: HashSet<String> = ["F1".to_string()].into();
        let updated = log.set_flag(&ids).await.unwrap();
        assert_eq!(updated, 2);

        let data = log.read_all().await.unwrap();
        assert_eq!(data.cell(0, "merge_status_tag"), Some("1"));
        assert_eq!(data.cell(2, "merge_status_tag"), Some("1"));
    }

    #[tokio::test]
    async fn test_set_flag_idempotent() {
        let (store, _temp) = store_with("tag_transcripts", &log_table()).await;
        let log = StageLog::new(
            &store,
            "tag_transcripts",
            "gd_transcript_file_id",
            "merge_status_tag",
        );

        let ids: HashSet<String> = ["F1".to_string(), "F2".to_string()].into();
        log.set_flag(&ids).await.unwrap();
        let after_first = log.read_all().await.unwrap();

        // Second call updates nothing and leaves the table identical
        let updated = log.set_flag(&ids).await.unwrap();
        assert_eq!(updated, 0);
        let after_second = log.read_all().await.unwrap();
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_set_flag_never_unsets() {
        let (store, _temp) = store_with("tag_transcripts", &log_table()).await;
        let log = StageLog::new(
            &store,
            "tag_transcripts",
            "gd_transcript_file_id",
            "merge_status_tag",
        );

        // F2 is already terminal; no update touches it
        let ids: HashSet<String> = ["F2".to_string()].into();
        let updated = log.set_flag(&ids).await.unwrap();
        assert_eq!(updated, 0);
        let data = log.read_all().await.unwrap();
        assert_eq!(data.cell(1, "merge_status_tag"), Some("1"));
    }

    #[tokio::test]
    async fn test_schema_drift_is_hard_stop() {
        let wrong = Table {
            header: vec!["some_other_id".into(), "merge_status_tag".into()],
            rows: vec![vec!["x".into(), "0".into()]],
        };
        let (store, _temp) = store_with("tag_transcripts", &wrong).await;
        let log = StageLog::new(
            &store,
            "tag_transcripts",
            "gd_transcript_file_id",
            "merge_status_tag",
        );

        assert!(log.read_all().await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_flag_column_backfills() {
        let legacy = Table {
            header: vec!["gd_transcript_file_id".into()],
            rows: vec![vec!["F1".into()]],
        };
        let (store, _temp) = store_with("tag_transcripts", &legacy).await;
        let log = StageLog::new(
            &store,
            "tag_transcripts",
            "gd_transcript_file_id",
            "merge_status_tag",
        );

        log.ensure_flag_column().await.unwrap();
        let data = log.read_all().await.unwrap();
        assert_eq!(data.cell(0, "merge_status_tag"), Some(""));
    }
}
