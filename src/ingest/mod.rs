//! Ingestion stage: turns source media into transcription log rows.
//!
//! One log row is appended per source media item, keyed by a fresh record
//! identifier that the item keeps for the rest of the pipeline. The
//! transcript itself is written next to the store; the log carries links
//! to it, never the content.
//!
//! ```text
//! audio file → Transcriber → TranscriptFormatter → transcripts/<id>.md
//!                                                → transcribe_audio row
//! ```

pub mod formatter;
pub mod transcriber;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::domain::schema::{TABLE_TRANSCRIBE, TIMESTAMP_FORMAT, TRANSCRIBE_HEADER};
use crate::domain::FLAG_UNSET;
use crate::store::{RowStore, Table};

pub use formatter::TranscriptFormatter;
pub use transcriber::{Transcriber, Transcript, WhisperTranscriber};

/// One completed ingestion, ready to be logged
#[derive(Debug, Clone)]
pub struct IngestRecord {
    /// Fresh record identifier for the media item
    pub record_id: String,

    /// When transcription finished
    pub datetime_transcribed: String,

    /// When the source media was uploaded (file mtime)
    pub datetime_uploaded: String,

    /// Audio duration in seconds
    pub seconds_transcribed: f64,

    /// Link to the source audio
    pub audio_file_link: String,

    /// Link to the stored transcript document
    pub transcript_doc_link: String,
}

/// Ingestion stage over a row store
pub struct IngestStage<'a, S: RowStore> {
    store: &'a S,

    /// Directory where transcript documents are written
    transcripts_dir: PathBuf,
}

impl<'a, S: RowStore> IngestStage<'a, S> {
    pub fn new(store: &'a S, transcripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            transcripts_dir: transcripts_dir.into(),
        }
    }

    /// Transcribe one media file and log it.
    ///
    /// The record identifier is a content hash, so re-ingesting the same
    /// bytes yields the same id; the log itself does not deduplicate.
    pub async fn process_file(
        &self,
        audio_path: &Path,
        transcriber: &dyn Transcriber,
        formatter: Option<&TranscriptFormatter>,
    ) -> Result<IngestRecord> {
        let record_id = file_record_id(audio_path).await?;
        info!(file = %audio_path.display(), %record_id, "ingesting media file");

        let uploaded = tokio::fs::metadata(audio_path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(chrono::DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);

        let transcript = transcriber.transcribe(audio_path).await?;

        let formatted = match formatter {
            Some(f) => f.format(&transcript.text).await?,
            None => transcript.text.clone(),
        };

        let doc_path = self.write_transcript_doc(&record_id, &transcript, &formatted).await?;

        let record = IngestRecord {
            record_id,
            datetime_transcribed: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            datetime_uploaded: uploaded.format(TIMESTAMP_FORMAT).to_string(),
            seconds_transcribed: transcript.duration_seconds,
            audio_file_link: audio_path.display().to_string(),
            transcript_doc_link: doc_path.display().to_string(),
        };
        self.record(&record).await?;

        Ok(record)
    }

    /// Append one transcription row to the stage log
    pub async fn record(&self, record: &IngestRecord) -> Result<()> {
        ensure_table(self.store, TABLE_TRANSCRIBE, TRANSCRIBE_HEADER).await?;

        let mut cells = HashMap::new();
        cells.insert("gd_transcript_file_id".to_string(), record.record_id.clone());
        cells.insert(
            "datetime_transcribed".to_string(),
            record.datetime_transcribed.clone(),
        );
        cells.insert(
            "datetime_uploaded".to_string(),
            record.datetime_uploaded.clone(),
        );
        cells.insert(
            "seconds_transcribed".to_string(),
            format!("{}", record.seconds_transcribed),
        );
        cells.insert("audio_file_link".to_string(), record.audio_file_link.clone());
        cells.insert(
            "transcript_doc_link".to_string(),
            record.transcript_doc_link.clone(),
        );
        cells.insert(
            "merge_status_transcribe".to_string(),
            FLAG_UNSET.to_string(),
        );

        let row = TRANSCRIBE_HEADER
            .iter()
            .map(|c| cells.remove(*c).unwrap_or_default())
            .collect();

        self.store
            .append_rows(TABLE_TRANSCRIBE, vec![row])
            .await
            .context("failed to append transcription row")?;
        info!(table = TABLE_TRANSCRIBE, "transcription logged");
        Ok(())
    }

    /// Write the transcript document, both raw and formatted text
    async fn write_transcript_doc(
        &self,
        record_id: &str,
        transcript: &Transcript,
        formatted: &str,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.transcripts_dir)
            .await
            .context("failed to create transcripts directory")?;

        let path = self.transcripts_dir.join(format!("SIGNAL_{}.md", record_id));
        let content = format!(
            "# Transcript {id}\n\n## Seconds transcribed\n\n{secs}\n\n\
             ## Raw Transcription\n\n{raw}\n\n## Formatted Transcription\n\n{formatted}\n",
            id = record_id,
            secs = transcript.duration_seconds,
            raw = transcript.text,
            formatted = formatted,
        );
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write transcript: {}", path.display()))?;
        Ok(path)
    }
}

/// Create a log table with its header on first use
pub(crate) async fn ensure_table<S: RowStore>(
    store: &S,
    table: &str,
    header: &[&str],
) -> Result<()> {
    let existing = store.read_table(table).await?;
    if existing.header.is_empty() {
        let data = Table::with_header(header.iter().copied());
        store.overwrite_table(table, &data).await?;
    }
    Ok(())
}

/// Record identifier for a local media file: SHA256 content hash, 12 hex
/// chars. Opaque to every later stage.
pub async fn file_record_id(path: &Path) -> Result<String> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read media file: {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let digest = hasher.finalize();
    Ok(hex::encode(&digest[..6]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileRowStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_appends_row_with_unset_flag() {
        let temp = TempDir::new().unwrap();
        let store = FileRowStore::open(temp.path().join("store")).await.unwrap();
        let stage = IngestStage::new(&store, temp.path().join("transcripts"));

        let record = IngestRecord {
            record_id: "abc123".into(),
            datetime_transcribed: "2024-10-15-100000000000".into(),
            datetime_uploaded: "2024-10-15-090000000000".into(),
            seconds_transcribed: 42.5,
            audio_file_link: "/audio/a.mp3".into(),
            transcript_doc_link: "/docs/a.md".into(),
        };
        stage.record(&record).await.unwrap();
        stage.record(&record).await.unwrap(); // no uniqueness constraint

        let data = store.read_table(TABLE_TRANSCRIBE).await.unwrap();
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.cell(0, "gd_transcript_file_id"), Some("abc123"));
        assert_eq!(data.cell(0, "merge_status_transcribe"), Some("0"));
        assert_eq!(data.cell(0, "seconds_transcribed"), Some("42.5"));
    }

    #[tokio::test]
    async fn test_file_record_id_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.mp3");
        tokio::fs::write(&path, b"same bytes").await.unwrap();

        let id1 = file_record_id(&path).await.unwrap();
        let id2 = file_record_id(&path).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 12);
    }
}
