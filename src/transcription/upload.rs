//! Checks applied to uploaded audio before it reaches a provider.

use super::AudioUpload;
use crate::error::ProviderError;

/// Content types the speech-to-text provider accepts.
pub const ALLOWED_AUDIO_TYPES: &[&str] = &[
    "audio/webm",
    "audio/mp3",
    "audio/wav",
    "audio/m4a",
    "audio/mpeg",
    "audio/ogg",
    "audio/x-wav",
    "audio/mp4",
];

/// Reject empty, oversized or non-audio uploads.
///
/// Parameters after `;` in the content type (e.g. `codecs=opus`) are ignored.
pub fn validate_upload(upload: &AudioUpload, max_bytes: usize) -> Result<(), ProviderError> {
    if upload.bytes.is_empty() {
        return Err(ProviderError::InvalidInput("No audio file provided".to_string()));
    }

    if upload.bytes.len() > max_bytes {
        return Err(ProviderError::InvalidInput(format!(
            "Audio file is {} bytes, the limit is {} bytes",
            upload.bytes.len(),
            max_bytes
        )));
    }

    let essence = upload
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !ALLOWED_AUDIO_TYPES.contains(&essence.as_str()) {
        return Err(ProviderError::InvalidInput(format!(
            "Invalid file type '{}'. Only audio files are allowed",
            upload.content_type
        )));
    }

    Ok(())
}
