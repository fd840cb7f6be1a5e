//! # Reference Text
//!
//! Canonical verse text comes from an external source behind [`VerseSource`].
//! Whatever the source, a range is validated the same way and its verses are
//! joined into one reference text with the end-of-ayah sign between them.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;
use crate::recitation::normalize::AYAH_SEPARATOR;

pub const SURAH_COUNT: u16 = 114;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verse {
    pub number: u16,
    pub text: String,
}

/// A contiguous run of verses from one surah.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseRange {
    pub surah: u16,
    pub verses: Vec<Verse>,
    pub combined_text: String,
}

impl VerseRange {
    /// Build a range from the verses of a whole surah, keeping `start..=end`.
    pub fn select(surah: u16, verses: Vec<Verse>, start: u16, end: u16) -> Result<Self, ProviderError> {
        let verses: Vec<Verse> = verses
            .into_iter()
            .filter(|v| v.number >= start && v.number <= end)
            .collect();

        if verses.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "Surah {} has no verses in range {}-{}",
                surah, start, end
            )));
        }

        let combined_text = join_verses(&verses);
        Ok(Self {
            surah,
            verses,
            combined_text,
        })
    }
}

/// Join verse texts with ` ۝ `.
pub fn join_verses(verses: &[Verse]) -> String {
    let separator = format!(" {} ", AYAH_SEPARATOR);
    verses
        .iter()
        .map(|v| v.text.trim())
        .collect::<Vec<_>>()
        .join(&separator)
}

/// Reject surah numbers and verse ranges that cannot exist.
pub fn validate_range(surah: u16, start: u16, end: u16) -> Result<(), ProviderError> {
    if surah == 0 || surah > SURAH_COUNT {
        return Err(ProviderError::InvalidInput(format!(
            "Surah number must be between 1 and {}, got {}",
            SURAH_COUNT, surah
        )));
    }
    if start == 0 {
        return Err(ProviderError::InvalidInput("Verse numbers start at 1".to_string()));
    }
    if start > end {
        return Err(ProviderError::InvalidInput(format!(
            "Start verse {} is after end verse {}",
            start, end
        )));
    }
    Ok(())
}

/// Source of canonical verse text.
#[async_trait]
pub trait VerseSource: Send + Sync {
    async fn get_verses(&self, surah: u16, start: u16, end: u16) -> Result<VerseRange, ProviderError>;

    fn name(&self) -> &'static str;
}
