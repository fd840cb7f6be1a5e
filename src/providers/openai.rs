//! OpenAI-compatible providers.
//!
//! Works with the OpenAI API and any server exposing the same
//! `/chat/completions` and `/audio/transcriptions` endpoints.
//!
//! - [`OpenAiEnricher`]: narrative feedback through a JSON-mode chat completion
//! - [`OpenAiTranscriber`]: Whisper speech-to-text over multipart upload

use async_trait::async_trait;
use reqwest::{header, multipart, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::check_status;
use crate::error::ProviderError;
use crate::recitation::enrichment::{Enrichment, EnrichmentRequest, RecitationEnricher, SuggestionOverride};
use crate::transcription::{AudioUpload, Transcript, TranscriptionProvider};

/// Connection details shared by both providers.
#[derive(Clone)]
pub struct OpenAiConnection {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiConnection {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authorization header value, or `Unavailable` when no key is configured.
    fn auth_header(&self) -> Result<String, ProviderError> {
        self.api_key
            .as_ref()
            .map(|k| format!("Bearer {}", k))
            .ok_or_else(|| ProviderError::Unavailable("OPENAI_API_KEY is not configured".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Chat enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

/// Shape the model is instructed to answer with.
#[derive(Debug, Deserialize)]
struct NarrativePayload {
    summary: String,
    encouragement: String,
    #[serde(default)]
    suggestions: Vec<SuggestionOverride>,
    #[serde(default)]
    pronunciation: Vec<usize>,
}

const SYSTEM_PROMPT: &str =
    "You are a Quran recitation tutor. Always respond with valid JSON only.";

pub struct OpenAiEnricher {
    connection: OpenAiConnection,
    model: String,
}

impl OpenAiEnricher {
    pub fn new(connection: OpenAiConnection, model: impl Into<String>) -> Self {
        Self {
            connection,
            model: model.into(),
        }
    }

    fn build_prompt(request: &EnrichmentRequest<'_>) -> String {
        let errors = serde_json::to_string(&request.result.errors).unwrap_or_else(|_| "[]".to_string());
        format!(
            "A student recited a passage of the Quran from memory. The word-level comparison is already done; \
             do not change it.\n\n\
             ORIGINAL TEXT:\n{}\n\n\
             STUDENT'S RECITATION (transcribed):\n{}\n\n\
             ACCURACY: {}%\n\
             ERRORS (1-based positions):\n{}\n\n\
             Respond with a JSON object of this exact structure:\n\
             {{\n  \"summary\": \"<brief summary of performance>\",\n  \
             \"encouragement\": \"<positive, encouraging message in English>\",\n  \
             \"suggestions\": [{{\"position\": <error position>, \"suggestion\": \"<helpful correction tip>\"}}],\n  \
             \"pronunciation\": [<positions of substitutions that are only mispronunciations>]\n}}",
            request.reference, request.transcription, request.result.overall_accuracy, errors
        )
    }
}

/// Strictly decode the assistant message of a chat completion.
fn parse_enrichment(response: ChatResponse) -> Result<Enrichment, ProviderError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Malformed("Chat completion has no content".to_string()))?;

    let payload: NarrativePayload = serde_json::from_str(&content)
        .map_err(|e| ProviderError::Malformed(format!("Narrative payload does not match schema: {}", e)))?;

    Ok(Enrichment {
        summary: Some(payload.summary),
        encouragement: Some(payload.encouragement),
        suggestions: payload.suggestions,
        pronunciation_positions: payload.pronunciation,
    })
}

#[async_trait]
impl RecitationEnricher for OpenAiEnricher {
    async fn enrich(&self, request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError> {
        let auth = self.connection.auth_header()?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(request),
                },
            ],
            temperature: 0.3,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!(model = %self.model, "Requesting narrative enrichment");

        let response = self
            .connection
            .client
            .post(self.connection.url("/chat/completions"))
            .header(header::AUTHORIZATION, auth)
            .json(&body)
            .send()
            .await?;

        let chat: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        parse_enrichment(chat)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// Whisper transcription
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

pub struct OpenAiTranscriber {
    connection: OpenAiConnection,
    model: String,
    language: String,
}

impl OpenAiTranscriber {
    pub fn new(connection: OpenAiConnection, model: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            connection,
            model: model.into(),
            language: language.into(),
        }
    }
}

fn parse_transcript(body: &str, fallback_language: &str) -> Result<Transcript, ProviderError> {
    let whisper: WhisperResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("Transcription payload does not match schema: {}", e)))?;

    Ok(Transcript {
        text: whisper.text.trim().to_string(),
        language: whisper
            .language
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| fallback_language.to_string()),
        duration_seconds: whisper.duration,
    })
}

#[async_trait]
impl TranscriptionProvider for OpenAiTranscriber {
    async fn transcribe(&self, upload: AudioUpload) -> Result<Transcript, ProviderError> {
        let auth = self.connection.auth_header()?;

        let size = upload.bytes.len();
        let file = multipart::Part::bytes(upload.bytes)
            .file_name(upload.filename)
            .mime_str(&upload.content_type)
            .map_err(|e| ProviderError::InvalidInput(format!("Invalid content type: {}", e)))?;

        let form = multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "verbose_json");

        debug!(model = %self.model, bytes = size, "Sending audio for transcription");

        let response = self
            .connection
            .client
            .post(self.connection.url("/audio/transcriptions"))
            .header(header::AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        parse_transcript(&body, &self.language)
    }

    fn name(&self) -> &'static str {
        "openai-whisper"
    }
}
