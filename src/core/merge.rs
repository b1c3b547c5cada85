//! Merge engine: joins the transcription and tagging logs into the merged
//! log and back-patches merge flags in both sources.
//!
//! The operation is deliberately two-phase: the merged rows are written to
//! log C first, then the source flags are flipped. The flip uses the
//! idempotent terminal-value check in [`StageLog::set_flag`], so a crash
//! between the phases is recovered by re-running the flip. A crash before
//! the flip but after the C append still duplicates the pair on the next
//! run; that gap is a documented property of the append step, which has no
//! dedup key.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::info;

use crate::domain::schema::{
    COL_MERGE_STATUS_TAG, COL_MERGE_STATUS_TRANSCRIBE, COL_RECORD_ID, COL_SENT_FLAG,
    TABLE_MERGED, TABLE_TAG, TABLE_TRANSCRIBE,
};
use crate::domain::{MergeStatus, SendStatus, FLAG_SET};
use crate::store::{RowStore, Table};

use super::stage_log::StageLog;

/// Result of one merge run
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Number of (transcription, tagging) pairs merged
    pub pairs_merged: usize,

    /// Identifiers whose source rows were flipped to merged
    pub identifiers: Vec<String>,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        self.pairs_merged == 0
    }
}

/// Merge engine over a row store
pub struct MergeEngine<'a, S: RowStore> {
    store: &'a S,
}

impl<'a, S: RowStore> MergeEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run one merge pass.
    ///
    /// Joins unmerged tagging rows with unmerged transcription rows on the
    /// record identifier, appends the joined rows to the merged log with a
    /// fresh unsent flag, then flips the merge flags in both source logs.
    /// An empty join is a no-op, not an error.
    pub async fn run(&self) -> Result<MergeOutcome> {
        let transcribe_log = StageLog::new(
            self.store,
            TABLE_TRANSCRIBE,
            COL_RECORD_ID,
            COL_MERGE_STATUS_TRANSCRIBE,
        );
        let tag_log = StageLog::new(self.store, TABLE_TAG, COL_RECORD_ID, COL_MERGE_STATUS_TAG);

        let transcribe = transcribe_log.read_all().await?;
        let tags = tag_log.read_all().await?;

        if transcribe.is_empty() || tags.is_empty() {
            info!("nothing to merge, one of the stage logs is empty");
            return Ok(MergeOutcome::default());
        }

        let joined = join_unmerged(&transcribe, &tags)?;
        if joined.rows.is_empty() {
            info!("no new data to merge");
            return Ok(MergeOutcome::default());
        }

        let identifiers: Vec<String> = {
            let id_idx = joined
                .column_index(COL_RECORD_ID)
                .context("join output missing the id column")?;
            let mut seen = HashSet::new();
            joined
                .rows
                .iter()
                .map(|r| r[id_idx].clone())
                .filter(|id| seen.insert(id.clone()))
                .collect()
        };
        let pairs_merged = joined.rows.len();

        // Phase 1: extend the merged log. Read-concatenate-overwrite, since
        // the store gives no read-after-write guarantee for appends made by
        // other processes.
        let existing = self.store.read_table(TABLE_MERGED).await?;
        let combined = concat_merged(existing, joined);
        self.store.overwrite_table(TABLE_MERGED, &combined).await?;
        info!(rows = pairs_merged, "merged rows written to '{}'", TABLE_MERGED);

        // Phase 2: back-patch source flags so the pairs never re-merge.
        let id_set: HashSet<String> = identifiers.iter().cloned().collect();
        tag_log.ensure_flag_column().await?;
        transcribe_log.ensure_flag_column().await?;
        tag_log.set_flag(&id_set).await?;
        transcribe_log.set_flag(&id_set).await?;

        Ok(MergeOutcome {
            pairs_merged,
            identifiers,
        })
    }
}

/// Inner join of the two stage logs on the record identifier, restricted to
/// row pairs where BOTH sides are unmerged.
///
/// The filter applies to rows, not identifier values: a transcription row
/// already flagged merged never re-pairs, even when a fresh unmerged tagging
/// row shares its identifier. Every surviving (transcription, tagging)
/// combination produces its own output row, so repeat tagging sessions each
/// get a report entry.
fn join_unmerged(transcribe: &Table, tags: &Table) -> Result<Table> {
    let t_id = transcribe
        .column_index(COL_RECORD_ID)
        .ok_or_else(|| anyhow::anyhow!("'{}' missing id column", TABLE_TRANSCRIBE))?;
    let g_id = tags
        .column_index(COL_RECORD_ID)
        .ok_or_else(|| anyhow::anyhow!("'{}' missing id column", TABLE_TAG))?;

    // Missing flag columns read as unmerged (backward compatibility)
    let t_flag = transcribe.column_index(COL_MERGE_STATUS_TRANSCRIBE);
    let g_flag = tags.column_index(COL_MERGE_STATUS_TAG);

    // Output header: tag columns first, then the transcription columns not
    // already present, then the fresh sent flag.
    let mut header: Vec<String> = tags.header.clone();
    if !header.iter().any(|c| c == COL_MERGE_STATUS_TAG) {
        header.push(COL_MERGE_STATUS_TAG.to_string());
    }
    for col in &transcribe.header {
        if !header.iter().any(|c| c == col) {
            header.push(col.clone());
        }
    }
    if !header.iter().any(|c| c == COL_MERGE_STATUS_TRANSCRIBE) {
        header.push(COL_MERGE_STATUS_TRANSCRIBE.to_string());
    }
    header.push(COL_SENT_FLAG.to_string());

    let mut out = Table::with_header(header.iter().map(String::as_str));

    for tag_row in &tags.rows {
        let tag_status = MergeStatus::from_cell(g_flag.map(|i| tag_row[i].as_str()));
        if tag_status == MergeStatus::Merged {
            continue;
        }
        for t_row in &transcribe.rows {
            if t_row[t_id] != tag_row[g_id] {
                continue;
            }
            let t_status = MergeStatus::from_cell(t_flag.map(|i| t_row[i].as_str()));
            if t_status == MergeStatus::Merged {
                continue;
            }

            let mut record = std::collections::HashMap::new();
            for (i, col) in tags.header.iter().enumerate() {
                record.insert(col.clone(), tag_row[i].clone());
            }
            for (i, col) in transcribe.header.iter().enumerate() {
                // The shared id column is identical on both sides
                record.entry(col.clone()).or_insert_with(|| t_row[i].clone());
            }
            // Joined rows carry terminal merge flags and a fresh unsent flag
            record.insert(COL_MERGE_STATUS_TAG.to_string(), FLAG_SET.to_string());
            record.insert(COL_MERGE_STATUS_TRANSCRIBE.to_string(), FLAG_SET.to_string());
            record.insert(
                COL_SENT_FLAG.to_string(),
                SendStatus::Unsent.as_cell().to_string(),
            );
            out.push_record(&record);
        }
    }

    Ok(out)
}

/// Concatenate new merged rows onto the existing merged log, aligning
/// headers by column name. Columns new to either side are added and old
/// rows padded with empty cells.
fn concat_merged(mut existing: Table, fresh: Table) -> Table {
    if existing.header.is_empty() {
        return fresh;
    }

    existing.extend_columns(fresh.header.iter().map(String::as_str));
    for row in 0..fresh.rows.len() {
        if let Some(record) = fresh.record(row) {
            existing.push_record(&record);
        }
    }
    existing
}
