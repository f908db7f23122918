//! Forced-alignment client
//!
//! Sends the track audio and the newline-separated lyric text; receives
//! word and character timings in seconds.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

use super::{build_http_client, fetch_bytes, ServiceError};
use crate::models::AlignmentResponse;

/// Maps known text onto audio
#[async_trait]
pub trait ForcedAligner: Send + Sync {
    /// Align `text` (lines separated by `\n`) against the audio at `audio_url`
    async fn align(&self, audio_url: &str, text: &str) -> Result<AlignmentResponse, ServiceError>;
}

/// HTTP forced-alignment client
pub struct HttpAlignmentClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpAlignmentClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, ServiceError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::Config(
                    "alignment API key not configured (set KARAOKE_ALIGNMENT_API_KEY or alignment.api_key)"
                        .to_string(),
                )
            })?;

        Ok(Self {
            // Alignment of a full song can take minutes
            http_client: build_http_client(Duration::from_secs(300))?,
            base_url: base_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl ForcedAligner for HttpAlignmentClient {
    async fn align(&self, audio_url: &str, text: &str) -> Result<AlignmentResponse, ServiceError> {
        let audio = fetch_bytes(&self.http_client, audio_url).await?;

        tracing::debug!(
            audio_bytes = audio.len(),
            text_chars = text.len(),
            "Requesting forced alignment"
        );

        let file = Part::bytes(audio)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        let form = Form::new().part("file", file).text("text", text.to_string());

        let response = self
            .http_client
            .post(&self.base_url)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        let alignment: AlignmentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        tracing::info!(
            words = alignment.words.len(),
            characters = alignment.characters.len(),
            loss = alignment.overall_loss,
            "Forced alignment received"
        );

        Ok(alignment)
    }
}
