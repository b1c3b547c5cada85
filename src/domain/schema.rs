//! Log table names and column schemas.
//!
//! These names are the bit-exact contract with the pre-existing spreadsheets;
//! renaming any of them breaks compatibility with logs already in the field.

/// Transcription stage log (log A)
pub const TABLE_TRANSCRIBE: &str = "transcribe_audio";

/// Tagging stage log (log B)
pub const TABLE_TAG: &str = "tag_transcripts";

/// Merged output log (log C)
pub const TABLE_MERGED: &str = "merged_data";

/// The record identifier column, shared by all three logs
pub const COL_RECORD_ID: &str = "gd_transcript_file_id";

/// Merge flag on the transcription log
pub const COL_MERGE_STATUS_TRANSCRIBE: &str = "merge_status_transcribe";

/// Merge flag on the tagging log
pub const COL_MERGE_STATUS_TAG: &str = "merge_status_tag";

/// Dispatch flag on the merged log
pub const COL_SENT_FLAG: &str = "sent_flag";

/// Header of the transcription stage log
pub const TRANSCRIBE_HEADER: &[&str] = &[
    COL_RECORD_ID,
    "datetime_transcribed",
    "datetime_uploaded",
    "seconds_transcribed",
    "audio_file_link",
    "transcript_doc_link",
    COL_MERGE_STATUS_TRANSCRIBE,
];

/// Header of the tagging stage log
pub const TAG_HEADER: &[&str] = &[
    COL_RECORD_ID,
    "datetime_tagged",
    "transcript_title",
    "who_recorded",
    "action_items",
    "contacts_linked",
    "companies_linked",
    "contacts_created",
    "companies_created",
    COL_MERGE_STATUS_TAG,
    "num_contacts_linked",
    "num_companies_linked",
    "num_contacts_created",
    "num_companies_created",
];

/// Timestamp format used across all logs, e.g. `2024-10-15-163816317000`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S%f";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_share_record_id() {
        assert_eq!(TRANSCRIBE_HEADER[0], COL_RECORD_ID);
        assert_eq!(TAG_HEADER[0], COL_RECORD_ID);
    }

    #[test]
    fn test_flag_columns_present() {
        assert!(TRANSCRIBE_HEADER.contains(&COL_MERGE_STATUS_TRANSCRIBE));
        assert!(TAG_HEADER.contains(&COL_MERGE_STATUS_TAG));
    }
}
