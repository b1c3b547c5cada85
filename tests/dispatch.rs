//! Dispatch Engine Integration Tests
//!
//! Covers send-once semantics, no-op runs without sender calls, and the
//! failed-delivery retry path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use signal_ingress::core::DispatchEngine;
use signal_ingress::domain::schema::{COL_RECORD_ID, COL_SENT_FLAG, TABLE_MERGED};
use signal_ingress::notify::ReportSender;
use signal_ingress::store::{FileRowStore, RowStore, Table};

/// Sender double that records deliveries and can be told to fail
#[derive(Default)]
struct TestSender {
    calls: AtomicUsize,
    fail: bool,
    last_body: Mutex<Option<String>>,
}

impl TestSender {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSender for TestSender {
    async fn send(&self, _subject: &str, markdown_body: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("simulated delivery failure");
        }
        *self.last_body.lock().unwrap() = Some(markdown_body.to_string());
        Ok(())
    }
}

async fn open_store() -> (FileRowStore, TempDir) {
    let temp = TempDir::new().unwrap();
    let store = FileRowStore::open(temp.path()).await.unwrap();
    (store, temp)
}

fn merged_table(rows: &[(&str, &str, &str)]) -> Table {
    Table {
        header: vec![
            COL_RECORD_ID.into(),
            "transcript_title".into(),
            COL_SENT_FLAG.into(),
        ],
        rows: rows
            .iter()
            .map(|(id, title, flag)| vec![(*id).into(), (*title).into(), (*flag).into()])
            .collect(),
    }
}

// Scenario: 3 merged rows, 2 unsent. One send flips both; the next run is
// a no-op with zero sender calls.
#[tokio::test]
async fn test_batch_sent_once() {
    let (store, _temp) = open_store().await;
    store
        .overwrite_table(
            TABLE_MERGED,
            &merged_table(&[("F1", "One", "1"), ("F2", "Two", "0"), ("F3", "Three", "0")]),
        )
        .await
        .unwrap();

    let sender = TestSender::default();
    let engine = DispatchEngine::new(&store, &sender, "987");

    let outcome = engine.run().await.unwrap();
    assert_eq!(outcome.sent, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(sender.call_count(), 1);

    // Both unsent rows are in the single report body
    let body = sender.last_body.lock().unwrap().clone().unwrap();
    assert!(body.contains("Two"));
    assert!(body.contains("Three"));

    let merged = store.read_table(TABLE_MERGED).await.unwrap();
    assert_eq!(merged.cell(1, COL_SENT_FLAG), Some("1"));
    assert_eq!(merged.cell(2, COL_SENT_FLAG), Some("1"));

    // Second run: nothing unsent, no network call
    let outcome = engine.run().await.unwrap();
    assert!(outcome.is_noop());
    assert_eq!(sender.call_count(), 1);
}

// Scenario: delivery fails. Flags stay unset and a retry re-sends the batch.
#[tokio::test]
async fn test_failed_delivery_leaves_flags_and_retries() {
    let (store, _temp) = open_store().await;
    store
        .overwrite_table(TABLE_MERGED, &merged_table(&[("F1", "One", "0")]))
        .await
        .unwrap();

    let failing = TestSender::failing();
    let engine = DispatchEngine::new(&store, &failing, "987");
    let err = engine.run().await.unwrap_err();
    assert!(err.to_string().contains("no flags were changed"));
    assert_eq!(failing.call_count(), 1);

    let merged = store.read_table(TABLE_MERGED).await.unwrap();
    assert_eq!(merged.cell(0, COL_SENT_FLAG), Some("0"));

    // Retry with a working sender delivers the same batch
    let sender = TestSender::default();
    let outcome = DispatchEngine::new(&store, &sender, "987").run().await.unwrap();
    assert_eq!(outcome.sent, 1);
    let merged = store.read_table(TABLE_MERGED).await.unwrap();
    assert_eq!(merged.cell(0, COL_SENT_FLAG), Some("1"));
}

#[tokio::test]
async fn test_empty_log_is_noop_without_sender_call() {
    let (store, _temp) = open_store().await;
    let sender = TestSender::default();

    let outcome = DispatchEngine::new(&store, &sender, "987").run().await.unwrap();
    assert!(outcome.is_noop());
    assert_eq!(sender.call_count(), 0);
}

// Rows predating the sent flag column have blank cells and are skipped,
// never re-sent.
#[tokio::test]
async fn test_legacy_rows_without_flag_are_skipped() {
    let (store, _temp) = open_store().await;
    store
        .overwrite_table(
            TABLE_MERGED,
            &merged_table(&[("F1", "Legacy", ""), ("F2", "Fresh", "0")]),
        )
        .await
        .unwrap();

    let sender = TestSender::default();
    let outcome = DispatchEngine::new(&store, &sender, "987").run().await.unwrap();
    assert_eq!(outcome.sent, 1);
    assert_eq!(outcome.skipped, 1);

    let merged = store.read_table(TABLE_MERGED).await.unwrap();
    assert_eq!(merged.cell(0, COL_SENT_FLAG), Some(""));
    assert_eq!(merged.cell(1, COL_SENT_FLAG), Some("1"));
}

// Repeat identifiers across merged rows are dispatched per row, not per id.
#[tokio::test]
async fn test_duplicate_identifiers_flip_per_row() {
    let (store, _temp) = open_store().await;
    store
        .overwrite_table(
            TABLE_MERGED,
            &merged_table(&[("F1", "First pass", "1"), ("F1", "Second pass", "0")]),
        )
        .await
        .unwrap();

    let sender = TestSender::default();
    let outcome = DispatchEngine::new(&store, &sender, "987").run().await.unwrap();
    assert_eq!(outcome.sent, 1);

    let merged = store.read_table(TABLE_MERGED).await.unwrap();
    assert_eq!(merged.cell(0, COL_SENT_FLAG), Some("1"));
    assert_eq!(merged.cell(1, COL_SENT_FLAG), Some("1"));
}
