//! signal-ingress - transcript ingestion pipeline with exactly-once reporting
//!
//! Recorded media moves through transcription, human tagging, and a merged
//! report log, with all state held in a row-oriented table store. Each
//! record passes through distinct stages (transcribed, tagged, merged,
//! sent) exactly once, even though every stage is a manually triggered
//! batch job run by different users at different times.
//!
//! # Architecture
//!
//! - Stage logs are append-only tables, one per stage, joined on an opaque
//!   record identifier
//! - Per-stage status flags (merge flags, sent flag) are monotonic: once
//!   terminal, never reset
//! - The merge engine joins the transcription and tagging logs and
//!   back-patches flags with an idempotent terminal-value check, so every
//!   flip is safe to retry
//! - The dispatch engine batches all unsent merged rows into one report
//!   and flips their flags only after successful delivery
//!
//! # Modules
//!
//! - `store`: row store abstraction and file-backed implementation
//! - `core`: StageLog, MergeEngine, DispatchEngine
//! - `domain`: flags and schema contracts
//! - `ingest`/`tagging`: the stages that produce log rows
//! - `report`/`notify`: rendering and delivery of the outbound report
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Transcribe and log media files
//! signal-ingress ingest recording.mp3
//!
//! # Record a tagging session
//! signal-ingress tag <record-id> --title "Kickoff Call"
//!
//! # Merge and send the report
//! signal-ingress report --merge-first
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod notify;
pub mod report;
pub mod store;
pub mod tagging;

// Re-export main types at crate root for convenience
pub use crate::core::{DispatchEngine, DispatchOutcome, MergeEngine, MergeOutcome, StageLog};
pub use domain::{MergeStatus, SendStatus};
pub use notify::{GmailSender, ReportSender};
pub use store::{FileRowStore, RowStore, StoreError, Table};

// Stage producers
pub use ingest::{IngestRecord, IngestStage, Transcriber, WhisperTranscriber};
pub use tagging::{TagSession, TagStage};
