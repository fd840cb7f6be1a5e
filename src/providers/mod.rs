//! # External Providers
//!
//! HTTP clients for the collaborators the service talks to:
//! - **openai**: Whisper transcription and JSON-mode chat enrichment
//! - **alquran**: canonical verse text from alquran.cloud
//!
//! Every payload is decoded into typed structs. Anything that does not fit
//! becomes `ProviderError::Malformed`.

pub mod alquran;
pub mod openai;

use reqwest::Client;
use std::time::Duration;

use crate::error::ProviderError;

pub use alquran::AlQuranCloudSource;
pub use openai::{OpenAiConnection, OpenAiEnricher, OpenAiTranscriber};

/// Shared client with the configured request timeout.
pub fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Unavailable(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-success response into a classified error.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(status, &body))
}
