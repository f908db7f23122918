//! External service clients
//!
//! Each collaborator sits behind a small async trait so task types can be
//! exercised against in-process fakes. The HTTP implementations live next
//! to their trait.

pub mod alignment_client;
pub mod separation_client;
pub mod storage;

pub use alignment_client::{ForcedAligner, HttpAlignmentClient};
pub use separation_client::{HttpSeparationClient, SeparatedStems, StemSeparator};
pub use storage::{GroveStorage, ObjectStorage, StoredObject};

use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("karaoke-tasks/", env!("CARGO_PKG_VERSION"));

/// External service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Shared HTTP client builder
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Network(e.to_string()))
}

/// Download a remote audio file into memory
pub(crate) async fn fetch_bytes(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, ServiceError> {
    tracing::debug!(url, "Downloading audio");

    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ServiceError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ServiceError::Api(status.as_u16(), error_text));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ServiceError::Network(e.to_string()))?;

    Ok(bytes.to_vec())
}
