//! Multipart form reading shared by the upload endpoints.

use crate::error::{AppError, AppResult};
use crate::transcription::AudioUpload;
use actix_multipart::{Field, Multipart};
use futures_util::stream::StreamExt;
use std::collections::HashMap;

/// Name of the form field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

/// Text fields are short identifiers; anything longer is rejected.
const MAX_TEXT_FIELD_BYTES: usize = 1024;

/// A parsed upload form: the audio part plus every text field.
#[derive(Debug, Default)]
pub struct AudioForm {
    pub audio: Option<AudioUpload>,
    pub fields: HashMap<String, String>,
}

impl AudioForm {
    pub fn require_audio(&mut self) -> AppResult<AudioUpload> {
        self.audio
            .take()
            .ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    /// Parse a required numeric field.
    pub fn number(&self, name: &str) -> AppResult<u16> {
        let raw = self
            .text(name)
            .ok_or_else(|| AppError::ValidationError(format!("Missing field {}", name)))?;
        raw.trim()
            .parse()
            .map_err(|_| AppError::ValidationError(format!("Field {} must be a positive integer", name)))
    }
}

async fn read_field(field: &mut Field, limit: usize, name: &str) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::ValidationError(format!(
                "Field {} exceeds the limit of {} bytes",
                name, limit
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Read the whole form, stopping early once the audio exceeds `max_audio_bytes`.
pub async fn read_audio_form(mut payload: Multipart, max_audio_bytes: usize) -> AppResult<AudioForm> {
    let mut form = AudioForm::default();

    while let Some(item) = payload.next().await {
        let mut field: Field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::BadRequest("Missing content disposition".to_string()))?;
        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| AppError::BadRequest("Missing field name".to_string()))?
            .to_string();

        if field_name == AUDIO_FIELD {
            let filename = content_disposition
                .get_filename()
                .map(str::to_string)
                .unwrap_or_else(|| "recording.webm".to_string());
            let content_type = field
                .content_type()
                .map(|mime| mime.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let bytes = read_field(&mut field, max_audio_bytes, AUDIO_FIELD).await?;
            form.audio = Some(AudioUpload {
                bytes,
                filename,
                content_type,
            });
        } else {
            let bytes = read_field(&mut field, MAX_TEXT_FIELD_BYTES, &field_name).await?;
            let value = String::from_utf8(bytes)
                .map_err(|_| AppError::ValidationError(format!("Field {} is not valid UTF-8", field_name)))?;
            form.fields.insert(field_name, value);
        }
    }

    Ok(form)
}
