//! Data carried in and out of a verification call.
//!
//! Every value here is created fresh for one call and never mutated after the
//! engine hands it back. Field names serialize in camelCase to match the
//! client contract.

use serde::{Deserialize, Serialize};

/// How one reference word was recited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordStatus {
    Correct,
    Incorrect,
    Missed,
    /// Only ever used for words outside the reference (see [`ExtraWord`])
    Extra,
}

/// One entry per reference word, in reference order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordResult {
    /// Reference word as it appears in the canonical text
    pub original: String,
    /// Recited word aligned to this position, `None` if it was skipped
    pub recited: Option<String>,
    pub status: WordStatus,
    /// 1-based position in the reference
    pub position: usize,
}

/// A recited word with no place in the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraWord {
    pub recited: String,
    /// Reference position the word follows; 0 when recited before the first word
    pub after_position: usize,
    pub status: WordStatus,
}

/// Category of a flagged discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Substitution,
    Omission,
    Addition,
    /// A substitution close enough to the expected word to be a pronunciation slip
    Pronunciation,
}

/// A discrepancy the learner should look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub position: usize,
    /// Expected word; empty for additions
    pub original: String,
    /// What was recited; empty for omissions
    pub recited: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Full result of a verification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Percentage of reference words recited correctly (0-100)
    pub overall_accuracy: u8,
    pub is_correct: bool,
    pub word_by_word: Vec<WordResult>,
    #[serde(default)]
    pub extra_words: Vec<ExtraWord>,
    pub errors: Vec<ErrorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encouragement: Option<String>,
}

impl VerificationResult {
    pub fn correct_count(&self) -> usize {
        self.word_by_word
            .iter()
            .filter(|w| w.status == WordStatus::Correct)
            .count()
    }

    pub fn count_errors(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }
}

/// Inclusive verse range within a surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseSpan {
    pub start: u16,
    pub end: u16,
}

/// Where the recited passage comes from. Only used for logging and for the
/// narrative pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationContext {
    #[serde(default)]
    pub surah_number: Option<u16>,
    #[serde(default)]
    pub verse_range: Option<VerseSpan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_entry_serializes_type_field() {
        let entry = ErrorEntry {
            kind: ErrorKind::Omission,
            position: 3,
            original: "رب".to_string(),
            recited: String::new(),
            suggestion: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "omission");
        assert_eq!(json["position"], 3);
        assert!(json.get("suggestion").is_none());
    }

    #[test]
    fn test_word_result_serializes_null_recited() {
        let word = WordResult {
            original: "لله".to_string(),
            recited: None,
            status: WordStatus::Missed,
            position: 2,
        };
        let json = serde_json::to_value(&word).unwrap();
        assert!(json["recited"].is_null());
        assert_eq!(json["status"], "missed");
    }

    #[test]
    fn test_context_accepts_camel_case() {
        let ctx: VerificationContext =
            serde_json::from_str(r#"{"surahNumber": 1, "verseRange": {"start": 1, "end": 7}}"#).unwrap();
        assert_eq!(ctx.surah_number, Some(1));
        assert_eq!(ctx.verse_range, Some(VerseSpan { start: 1, end: 7 }));
    }
}
