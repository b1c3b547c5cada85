//! Data structures and schema contracts for the pipeline.
//!
//! A record identifier is an opaque string naming one source media item
//! end-to-end; it is never regenerated and is the single join key across
//! all three stage logs.

pub mod flags;
pub mod schema;

pub use flags::{MergeStatus, SendStatus, FLAG_SET, FLAG_UNSET};
