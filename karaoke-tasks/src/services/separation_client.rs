//! Source-separation client
//!
//! Talks to a self-hosted separation server's synchronous endpoint. Audio
//! travels base64-encoded in both directions.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_http_client, fetch_bytes, ServiceError};
use karaoke_common::config::SeparationSettings;

/// Vocal and instrumental stems for one track
#[derive(Debug, Clone)]
pub struct SeparatedStems {
    pub vocals: Vec<u8>,
    pub instrumental: Vec<u8>,
    /// MIME type of both stems
    pub content_type: String,
    pub model: String,
    /// Server-reported processing time
    pub duration_secs: f64,
}

/// Splits a mixed track into stems
#[async_trait]
pub trait StemSeparator: Send + Sync {
    async fn separate(&self, audio_url: &str) -> Result<SeparatedStems, ServiceError>;
}

#[derive(Debug, Serialize)]
struct SeparateRequest<'a> {
    audio_base64: String,
    model: &'a str,
    output_format: &'a str,
    mp3_bitrate: u32,
}

#[derive(Debug, Deserialize)]
struct SeparateResponse {
    vocals_base64: String,
    instrumental_base64: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    duration: f64,
}

/// HTTP separation client
pub struct HttpSeparationClient {
    http_client: reqwest::Client,
    settings: SeparationSettings,
}

impl HttpSeparationClient {
    pub fn new(settings: SeparationSettings) -> Result<Self, ServiceError> {
        Ok(Self {
            // CPU separation of a full track is slow
            http_client: build_http_client(Duration::from_secs(900))?,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/separate-sync", self.settings.base_url.trim_end_matches('/'))
    }
}

fn content_type_for(format: &str) -> &'static str {
    match format {
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        _ => "audio/mpeg",
    }
}

fn decode_stem(name: &str, encoded: &str) -> Result<Vec<u8>, ServiceError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| ServiceError::Parse(format!("{} stem is not valid base64: {}", name, e)))
}

#[async_trait]
impl StemSeparator for HttpSeparationClient {
    async fn separate(&self, audio_url: &str) -> Result<SeparatedStems, ServiceError> {
        let audio = fetch_bytes(&self.http_client, audio_url).await?;

        tracing::debug!(
            audio_bytes = audio.len(),
            model = %self.settings.model,
            "Requesting stem separation"
        );

        let request = SeparateRequest {
            audio_base64: STANDARD.encode(&audio),
            model: &self.settings.model,
            output_format: &self.settings.output_format,
            mp3_bitrate: self.settings.mp3_bitrate,
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        let body: SeparateResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        let format = body
            .format
            .unwrap_or_else(|| self.settings.output_format.clone());

        let stems = SeparatedStems {
            vocals: decode_stem("vocals", &body.vocals_base64)?,
            instrumental: decode_stem("instrumental", &body.instrumental_base64)?,
            content_type: content_type_for(&format).to_string(),
            model: body.model.unwrap_or_else(|| self.settings.model.clone()),
            duration_secs: body.duration,
        };

        tracing::info!(
            vocals_bytes = stems.vocals.len(),
            instrumental_bytes = stems.instrumental.len(),
            duration_secs = stems.duration_secs,
            "Stem separation complete"
        );

        Ok(stems)
    }
}
