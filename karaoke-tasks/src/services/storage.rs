//! Object storage client
//!
//! Uploads are immutable blobs addressed by the URI the store returns.
//! The engine never interprets the stored bytes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_http_client, ServiceError};
use karaoke_common::config::StorageSettings;

/// Location of an uploaded object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub uri: String,
    #[serde(rename = "gatewayUrl", default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, ServiceError>;
}

/// Grove storage client
pub struct GroveStorage {
    http_client: reqwest::Client,
    settings: StorageSettings,
}

/// Upload responses arrive either as one object or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    One(StoredObject),
    Many(Vec<StoredObject>),
}

impl UploadResponse {
    fn into_first(self) -> Option<StoredObject> {
        match self {
            UploadResponse::One(object) => Some(object),
            UploadResponse::Many(objects) => objects.into_iter().next(),
        }
    }
}

impl GroveStorage {
    pub fn new(settings: StorageSettings) -> Result<Self, ServiceError> {
        Ok(Self {
            http_client: build_http_client(Duration::from_secs(120))?,
            settings,
        })
    }
}

fn parse_upload_response(body: &str) -> Result<StoredObject, ServiceError> {
    let response: UploadResponse =
        serde_json::from_str(body).map_err(|e| ServiceError::Parse(e.to_string()))?;

    response
        .into_first()
        .filter(|object| !object.uri.is_empty())
        .ok_or_else(|| ServiceError::Parse("upload response carried no uri".to_string()))
}

#[async_trait]
impl ObjectStorage for GroveStorage {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, ServiceError> {
        let size = bytes.len();

        let response = self
            .http_client
            .post(&self.settings.base_url)
            .query(&[("chain_id", self.settings.chain_id)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !matches!(status.as_u16(), 200 | 201 | 202) {
            return Err(ServiceError::Api(status.as_u16(), body));
        }

        let object = parse_upload_response(&body)?;
        tracing::info!(size, uri = %object.uri, "Uploaded object");

        Ok(object)
    }
}
