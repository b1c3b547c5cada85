//! LLM cleanup pass over a raw transcription.
//!
//! The raw speech-to-text output is reformatted for a reader before it is
//! stored; unintelligible fragments are marked `(*sp?)` for the tagging
//! stage to resolve against the source audio.

use anyhow::{Context, Result};
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "Optimize this raw transcription by formatting and cleaning up the \
text for a reader. It is important that you preserve all details. Write as if you were a \
diligent third party analyzing the transcript presented by your boss, not simply a first-person \
reformat. It is important you communicate the important components of their message directly. \
In parts of the text that seem to not make sense, remember that this is an audio transcript, \
and mark these as (*sp?)";

/// Chat-completion client that rewrites raw transcripts
pub struct TranscriptFormatter {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl TranscriptFormatter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Produce the formatted transcript for a raw transcription
    pub async fn format(&self, raw_transcription: &str) -> Result<String> {
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": raw_transcription },
                ],
            }))
            .send()
            .await
            .context("failed to reach the completion API")?;

        if !response.status().is_success() {
            anyhow::bail!("completion API returned status {}", response.status());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to parse completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("completion response had no choices")
    }
}
