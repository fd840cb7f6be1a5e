//! # Recitation Verification Engine
//!
//! Turns a transcription and a reference text into a [`VerificationResult`].
//!
//! ## Pipeline:
//! 1. **Tokenize** both texts (normalized keys, original spelling for display)
//! 2. **Align** the keys word by word (see `alignment`)
//! 3. **Classify** every reference word as correct, incorrect or missed
//! 4. **Collect errors** in reading order, including additions
//! 5. **Score**: share of reference words recited correctly
//! 6. **Enrich** (optional): narrative text from a [`RecitationEnricher`]
//!
//! Steps 1-5 are pure and live in [`score_recitation`]. Step 6 is the only
//! place a verification can fail, and whether it does is decided by the
//! [`FailurePolicy`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::alignment::{align_words, AlignmentOp};
use super::enrichment::{EnrichmentRequest, RecitationEnricher, ResilientEnricher};
use super::normalize::{fold_letters, tokenize_with_display, Token};
use super::similarity::similarity_ratio;
use super::types::{
    ErrorEntry, ErrorKind, ExtraWord, VerificationContext, VerificationResult, WordResult, WordStatus,
};
use crate::error::VerificationError;

/// What to do when the enrichment pass fails after its retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the deterministic result and drop the narrative fields
    #[default]
    Degrade,
    /// Fail the whole verification
    Propagate,
}

/// Per-call knobs, snapshotted from the live configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSettings {
    pub pass_threshold: u8,
    pub near_miss_threshold: f64,
    pub enrichment_timeout: Duration,
    pub enrichment_retries: u32,
    pub failure_policy: FailurePolicy,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            pass_threshold: 85,
            near_miss_threshold: 0.75,
            enrichment_timeout: Duration::from_millis(4000),
            enrichment_retries: 1,
            failure_policy: FailurePolicy::Degrade,
        }
    }
}

/// How the enrichment pass went.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Applied,
    /// Enrichment failed and the policy allowed a deterministic-only result
    Degraded(String),
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub result: VerificationResult,
    pub enrichment: EnrichmentOutcome,
}

fn suggestion_for(kind: ErrorKind, original: &str, recited: &str) -> String {
    match kind {
        ErrorKind::Substitution => format!("Recite \"{}\" instead of \"{}\".", original, recited),
        ErrorKind::Pronunciation => {
            format!("Close, but \"{}\" was heard. Pronounce \"{}\" carefully.", recited, original)
        }
        ErrorKind::Omission => format!("The word \"{}\" was skipped.", original),
        ErrorKind::Addition => format!("\"{}\" is not part of this passage.", recited),
    }
}

fn is_near_miss(reference: &Token, recited: &Token, threshold: f64) -> bool {
    similarity_ratio(&fold_letters(&reference.key), &fold_letters(&recited.key)) >= threshold
}

/// Deterministic part of a verification.
///
/// Never fails. An empty transcription or reference is scored, not rejected.
pub fn score_recitation(
    transcription: &str,
    reference_text: &str,
    pass_threshold: u8,
    near_miss_threshold: f64,
) -> VerificationResult {
    let reference = tokenize_with_display(reference_text);
    let recited = tokenize_with_display(transcription);

    let ref_keys: Vec<String> = reference.iter().map(|t| t.key.clone()).collect();
    let rec_keys: Vec<String> = recited.iter().map(|t| t.key.clone()).collect();
    let ops = align_words(&ref_keys, &rec_keys);

    let mut word_by_word = Vec::with_capacity(reference.len());
    let mut extra_words = Vec::new();
    let mut errors = Vec::new();
    let mut consumed = 0usize;

    for op in ops {
        match op {
            AlignmentOp::Match { reference: r, recited: h } => {
                consumed = r + 1;
                word_by_word.push(WordResult {
                    original: reference[r].display.clone(),
                    recited: Some(recited[h].display.clone()),
                    status: WordStatus::Correct,
                    position: consumed,
                });
            }
            AlignmentOp::Substitute { reference: r, recited: h } => {
                consumed = r + 1;
                let kind = if is_near_miss(&reference[r], &recited[h], near_miss_threshold) {
                    ErrorKind::Pronunciation
                } else {
                    ErrorKind::Substitution
                };
                let original = reference[r].display.clone();
                let said = recited[h].display.clone();
                errors.push(ErrorEntry {
                    kind,
                    position: consumed,
                    suggestion: Some(suggestion_for(kind, &original, &said)),
                    original: original.clone(),
                    recited: said.clone(),
                });
                word_by_word.push(WordResult {
                    original,
                    recited: Some(said),
                    status: WordStatus::Incorrect,
                    position: consumed,
                });
            }
            AlignmentOp::Omit { reference: r } => {
                consumed = r + 1;
                let original = reference[r].display.clone();
                errors.push(ErrorEntry {
                    kind: ErrorKind::Omission,
                    position: consumed,
                    suggestion: Some(suggestion_for(ErrorKind::Omission, &original, "")),
                    original: original.clone(),
                    recited: String::new(),
                });
                word_by_word.push(WordResult {
                    original,
                    recited: None,
                    status: WordStatus::Missed,
                    position: consumed,
                });
            }
            AlignmentOp::Insert { recited: h } => {
                let said = recited[h].display.clone();
                errors.push(ErrorEntry {
                    kind: ErrorKind::Addition,
                    position: consumed,
                    suggestion: Some(suggestion_for(ErrorKind::Addition, "", &said)),
                    original: String::new(),
                    recited: said.clone(),
                });
                extra_words.push(ExtraWord {
                    recited: said,
                    after_position: consumed,
                    status: WordStatus::Extra,
                });
            }
        }
    }

    let correct = word_by_word
        .iter()
        .filter(|w| w.status == WordStatus::Correct)
        .count();
    let overall_accuracy = if reference.is_empty() {
        0
    } else {
        (100.0 * correct as f64 / reference.len() as f64).round() as u8
    };

    VerificationResult {
        overall_accuracy,
        is_correct: !reference.is_empty() && overall_accuracy >= pass_threshold,
        word_by_word,
        extra_words,
        errors,
        summary: None,
        encouragement: None,
    }
}

/// Full verification: deterministic scoring plus the enrichment pass.
#[derive(Clone)]
pub struct RecitationVerifier {
    enricher: Arc<dyn RecitationEnricher>,
}

impl RecitationVerifier {
    pub fn new(enricher: Arc<dyn RecitationEnricher>) -> Self {
        Self { enricher }
    }

    pub fn enricher_name(&self) -> &'static str {
        self.enricher.name()
    }

    pub async fn verify(
        &self,
        transcription: &str,
        reference_text: &str,
        context: &VerificationContext,
        settings: &VerificationSettings,
    ) -> Result<Verification, VerificationError> {
        // Alignment is quadratic in the word counts, so it runs off the async workers.
        let (owned_transcription, owned_reference) = (transcription.to_owned(), reference_text.to_owned());
        let (pass_threshold, near_miss_threshold) = (settings.pass_threshold, settings.near_miss_threshold);
        let mut result = tokio::task::spawn_blocking(move || {
            score_recitation(&owned_transcription, &owned_reference, pass_threshold, near_miss_threshold)
        })
        .await
        .map_err(|e| VerificationError::Unavailable(format!("scoring task failed: {}", e)))?;

        let resilient = ResilientEnricher::new(
            self.enricher.as_ref(),
            settings.enrichment_timeout,
            settings.enrichment_retries,
        );
        let request = EnrichmentRequest {
            transcription,
            reference: reference_text,
            result: &result,
            context,
        };

        let enrichment = match resilient.enrich(&request).await {
            Ok(enrichment) => {
                enrichment.apply_to(&mut result);
                EnrichmentOutcome::Applied
            }
            Err(err) => match settings.failure_policy {
                FailurePolicy::Degrade => {
                    warn!(
                        enricher = self.enricher.name(),
                        error = %err,
                        "Enrichment failed, returning deterministic result"
                    );
                    EnrichmentOutcome::Degraded(err.to_string())
                }
                FailurePolicy::Propagate => {
                    warn!(enricher = self.enricher.name(), error = %err, "Enrichment failed");
                    return Err(err.into());
                }
            },
        };

        info!(
            surah = ?context.surah_number,
            reference_words = result.word_by_word.len(),
            accuracy = result.overall_accuracy,
            errors = result.errors.len(),
            enrichment = ?enrichment,
            "Recitation verified"
        );

        Ok(Verification { result, enrichment })
    }
}
