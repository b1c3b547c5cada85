//! Dispatch engine: batches unsent merged rows into one outbound report
//! and flips their sent flags only after successful delivery.
//!
//! Delivery is a single all-or-nothing call with no automatic retry: a
//! failed send leaves every flag at its initial value, so the next run
//! naturally re-sends the same batch. Re-sending is acceptable because the
//! recipient treats the report as idempotent.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::domain::schema::{COL_SENT_FLAG, TABLE_MERGED};
use crate::domain::SendStatus;
use crate::notify::ReportSender;
use crate::report;
use crate::store::RowStore;

/// Result of one dispatch run
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// Rows included in the delivered report
    pub sent: usize,

    /// Rows already sent (or without a dispatch flag) that were skipped
    pub skipped: usize,
}

impl DispatchOutcome {
    pub fn is_noop(&self) -> bool {
        self.sent == 0
    }
}

/// Dispatch engine over a row store and a report sender
pub struct DispatchEngine<'a, S: RowStore, N: ReportSender> {
    store: &'a S,
    sender: &'a N,
    portal_id: &'a str,
}

impl<'a, S: RowStore, N: ReportSender> DispatchEngine<'a, S, N> {
    pub fn new(store: &'a S, sender: &'a N, portal_id: &'a str) -> Self {
        Self {
            store,
            sender,
            portal_id,
        }
    }

    /// Run one dispatch pass.
    ///
    /// Renders every unsent merged row into a single report, delivers it
    /// once, and on success flips exactly those rows to sent. An empty
    /// batch performs no sender call at all.
    pub async fn run(&self) -> Result<DispatchOutcome> {
        let mut merged = self
            .store
            .read_table(TABLE_MERGED)
            .await
            .with_context(|| format!("failed to read log '{}'", TABLE_MERGED))?;

        if merged.is_empty() {
            info!("no merged data to dispatch");
            return Ok(DispatchOutcome::default());
        }

        // Collect the unsent batch by row index; identifiers may repeat
        // across merged rows, so flags are flipped per row, not per id.
        let flag_idx = merged.column_index(COL_SENT_FLAG);
        let mut unsent = Vec::new();
        let mut skipped = 0usize;
        for (row_idx, row) in merged.rows.iter().enumerate() {
            let cell = flag_idx.map(|i| row[i].as_str());
            match SendStatus::from_cell(cell) {
                Some(SendStatus::Unsent) => unsent.push(row_idx),
                _ => skipped += 1,
            }
        }

        if unsent.is_empty() {
            info!("no new rows to send");
            return Ok(DispatchOutcome { sent: 0, skipped });
        }

        let records: Vec<_> = unsent
            .iter()
            .filter_map(|&i| merged.record(i))
            .collect();
        let body = report::render_report(&records, self.portal_id);
        let subject = format!("NOS Transcripts Report - {}", Utc::now().format("%Y-%m-%d"));

        // One delivery attempt covering the whole batch; failure leaves all
        // flags untouched and surfaces to the caller.
        self.sender
            .send(&subject, &body)
            .await
            .context("report delivery failed, no flags were changed")?;

        // A non-empty batch implies the column was present on read
        let flag_idx = flag_idx.context("sent flag column missing")?;
        for &row_idx in &unsent {
            merged.rows[row_idx][flag_idx] = SendStatus::Sent.as_cell().to_string();
        }
        self.store
            .overwrite_table(TABLE_MERGED, &merged)
            .await
            .with_context(|| format!("failed to overwrite log '{}'", TABLE_MERGED))?;

        info!(sent = unsent.len(), skipped, "report dispatched");
        Ok(DispatchOutcome {
            sent: unsent.len(),
            skipped,
        })
    }
}
