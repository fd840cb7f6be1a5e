//! alquran.cloud verse source.
//!
//! Fetches a whole surah in one edition (`quran-uthmani` by default) and
//! keeps only the requested verses.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::check_status;
use crate::error::ProviderError;
use crate::quran::{validate_range, Verse, VerseRange, VerseSource};

pub struct AlQuranCloudSource {
    client: Client,
    base_url: String,
    edition: String,
}

#[derive(Debug, Deserialize)]
struct SurahEnvelope {
    code: u16,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SurahData {
    ayahs: Vec<Ayah>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ayah {
    number_in_surah: u16,
    text: String,
}

impl AlQuranCloudSource {
    pub fn new(client: Client, base_url: impl Into<String>, edition: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            edition: edition.into(),
        }
    }

    fn surah_url(&self, surah: u16) -> String {
        format!("{}/surah/{}/{}", self.base_url, surah, self.edition)
    }
}

/// Decode a `/surah/{n}/{edition}` body into verses.
fn parse_surah(body: &str) -> Result<Vec<Verse>, ProviderError> {
    let envelope: SurahEnvelope = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("Unexpected surah payload: {}", e)))?;

    match envelope.code {
        200 => {}
        404 => return Err(ProviderError::NotFound("Surah not found".to_string())),
        other => {
            return Err(ProviderError::Malformed(format!(
                "Surah payload reported code {}",
                other
            )))
        }
    }

    let data = envelope
        .data
        .ok_or_else(|| ProviderError::Malformed("Surah payload has no data".to_string()))?;
    let data: SurahData = serde_json::from_value(data)
        .map_err(|e| ProviderError::Malformed(format!("Unexpected surah data: {}", e)))?;

    Ok(data
        .ayahs
        .into_iter()
        .map(|a| Verse {
            number: a.number_in_surah,
            text: a.text,
        })
        .collect())
}

#[async_trait]
impl VerseSource for AlQuranCloudSource {
    async fn get_verses(&self, surah: u16, start: u16, end: u16) -> Result<VerseRange, ProviderError> {
        validate_range(surah, start, end)?;

        let url = self.surah_url(surah);
        debug!(%url, "Fetching surah text");

        let response = check_status(self.client.get(&url).send().await?).await?;
        let body = response.text().await?;
        let verses = parse_surah(&body)?;

        VerseRange::select(surah, verses, start, end)
    }

    fn name(&self) -> &'static str {
        "alquran.cloud"
    }
}
