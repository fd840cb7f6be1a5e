//! # Transcription Module
//!
//! Speech-to-text is an external collaborator. This module defines the seam
//! ([`TranscriptionProvider`]) and the checks every upload passes before it
//! is sent anywhere. The OpenAI Whisper client lives in `providers::openai`.
//!
//! ## Key Components:
//! - **AudioUpload**: raw bytes plus the metadata the client sent
//! - **Transcript**: the provider's text, language and duration
//! - **Upload validation**: size limit and audio content-type allowlist

pub mod upload;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;

pub use upload::{validate_upload, ALLOWED_AUDIO_TYPES};

/// Audio received from a client.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Text produced from an audio upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub language: String,
    /// Length of the audio in seconds, when the provider reports it
    #[serde(rename = "duration")]
    pub duration_seconds: Option<f64>,
}

/// Converts recited audio to Arabic text.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn transcribe(&self, upload: AudioUpload) -> Result<Transcript, ProviderError>;

    fn name(&self) -> &'static str;
}
