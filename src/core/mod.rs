//! Core pipeline logic.
//!
//! This module contains:
//! - StageLog: one row-store table per pipeline stage
//! - MergeEngine: joins stage logs and back-patches merge flags
//! - DispatchEngine: batches unsent merged rows into one report

pub mod dispatch;
pub mod merge;
pub mod stage_log;

// Re-export commonly used types
pub use dispatch::{DispatchEngine, DispatchOutcome};
pub use merge::{MergeEngine, MergeOutcome};
pub use stage_log::StageLog;
