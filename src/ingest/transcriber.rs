//! Speech-to-text backends for the ingestion stage.
//!
//! The stage itself only needs raw text plus the audio duration; the
//! backend is a trait so the log-writing path can be tested without a
//! local whisper install.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

/// Result of one transcription
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Raw transcription text
    pub text: String,

    /// Audio duration in seconds
    pub duration_seconds: f64,
}

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;
}

/// Transcriber shelling out to a local whisper binary
pub struct WhisperTranscriber {
    model: String,
}

/// Whisper output JSON structure
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    end: f64,
}

impl WhisperTranscriber {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        let whisper_path =
            std::env::var("WHISPER_PATH").unwrap_or_else(|_| "whisper".to_string());

        let temp_dir = tempfile::tempdir().context("failed to create temp dir")?;

        let output = Command::new(&whisper_path)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_dir")
            .arg(temp_dir.path())
            .arg("--output_format")
            .arg("json")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("failed to run whisper")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("whisper failed: {}", stderr);
        }

        let stem = audio_path.file_stem().unwrap_or_default().to_string_lossy();
        let json_path = temp_dir.path().join(format!("{}.json", stem));

        let json_content = tokio::fs::read_to_string(&json_path)
            .await
            .context("failed to read whisper output")?;

        let whisper: WhisperOutput =
            serde_json::from_str(&json_content).context("failed to parse whisper JSON")?;

        let duration = whisper.segments.last().map(|s| s.end).unwrap_or(0.0);

        Ok(Transcript {
            text: whisper.text.trim().to_string(),
            duration_seconds: duration,
        })
    }
}
