//! # Narrative Enrichment
//!
//! The optional last pass of a verification. An enricher receives the
//! deterministic result and may hand back prose (a summary and an
//! encouragement), better suggestion texts, and a list of substitutions it
//! considers pronunciation slips.
//!
//! Enrichment never touches scores or word statuses. See
//! [`Enrichment::apply_to`] for exactly what it is allowed to change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{ErrorKind, VerificationContext, VerificationResult};
use crate::error::ProviderError;

/// Everything an enricher may look at.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentRequest<'a> {
    pub transcription: &'a str,
    pub reference: &'a str,
    pub result: &'a VerificationResult,
    pub context: &'a VerificationContext,
}

/// Replacement suggestion for the error at `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionOverride {
    pub position: usize,
    pub suggestion: String,
}

/// Output of an enrichment pass. Every field is optional refinement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub summary: Option<String>,
    pub encouragement: Option<String>,
    pub suggestions: Vec<SuggestionOverride>,
    /// Positions whose substitution should be reported as pronunciation
    pub pronunciation_positions: Vec<usize>,
}

impl Enrichment {
    /// Fold this enrichment into a deterministic result.
    ///
    /// Only `substitution` entries can be retagged, only suggestions and the
    /// two text fields can be replaced, and positions with no matching error
    /// are ignored.
    pub fn apply_to(self, result: &mut VerificationResult) {
        for position in &self.pronunciation_positions {
            for entry in result.errors.iter_mut() {
                if entry.position == *position && entry.kind == ErrorKind::Substitution {
                    entry.kind = ErrorKind::Pronunciation;
                }
            }
        }

        for over in self.suggestions {
            let suggestion = over.suggestion.trim();
            if suggestion.is_empty() {
                continue;
            }
            // Reference-word errors come before additions at the same position.
            if let Some(entry) = result.errors.iter_mut().find(|e| e.position == over.position) {
                entry.suggestion = Some(suggestion.to_string());
            }
        }

        result.summary = self.summary.filter(|s| !s.trim().is_empty());
        result.encouragement = self.encouragement.filter(|s| !s.trim().is_empty());
    }
}

/// A narrative provider.
#[async_trait]
pub trait RecitationEnricher: Send + Sync {
    async fn enrich(&self, request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError>;

    /// Short name for logs and `/health`
    fn name(&self) -> &'static str;
}

/// Adds nothing.
pub struct NoopEnricher;

#[async_trait]
impl RecitationEnricher for NoopEnricher {
    async fn enrich(&self, _request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError> {
        Ok(Enrichment::default())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Template feedback built from the score and error counts. Never fails.
pub struct LocalFeedbackEnricher;

impl LocalFeedbackEnricher {
    fn summary(result: &VerificationResult) -> String {
        let total = result.word_by_word.len();
        if total == 0 {
            return "No reference words to compare against.".to_string();
        }

        let mut parts = Vec::new();
        for (kind, label) in [
            (ErrorKind::Omission, "missed"),
            (ErrorKind::Substitution, "substituted"),
            (ErrorKind::Pronunciation, "mispronounced"),
            (ErrorKind::Addition, "added"),
        ] {
            let count = result.count_errors(kind);
            if count > 0 {
                let noun = if count == 1 { "word" } else { "words" };
                parts.push(format!("{} {} {}", count, noun, label));
            }
        }

        let mut summary = format!(
            "You recited {} of {} words correctly ({}%).",
            result.correct_count(),
            total,
            result.overall_accuracy
        );
        if !parts.is_empty() {
            summary.push(' ');
            summary.push_str(&capitalize(&parts.join(", ")));
            summary.push('.');
        }
        summary
    }

    fn encouragement(result: &VerificationResult) -> &'static str {
        match result.overall_accuracy {
            100 => "Excellent! A flawless recitation. May Allah bless your memorization.",
            90..=99 => "Very well done. Only small slips remain, review them and try once more.",
            70..=89 => "Good progress. Focus on the highlighted words and repeat the passage.",
            40..=69 => "Keep going. Listen to the passage again and recite it in smaller parts.",
            _ => "Every attempt counts. Start with the first verse and build up from there.",
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl RecitationEnricher for LocalFeedbackEnricher {
    async fn enrich(&self, request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError> {
        Ok(Enrichment {
            summary: Some(Self::summary(request.result)),
            encouragement: Some(Self::encouragement(request.result).to_string()),
            ..Enrichment::default()
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Bounds another enricher with a per-attempt timeout and retries transient
/// failures.
pub struct ResilientEnricher<'a> {
    inner: &'a dyn RecitationEnricher,
    timeout: Duration,
    retries: u32,
}

impl<'a> ResilientEnricher<'a> {
    pub fn new(inner: &'a dyn RecitationEnricher, timeout: Duration, retries: u32) -> Self {
        Self {
            inner,
            timeout,
            retries,
        }
    }
}

#[async_trait]
impl RecitationEnricher for ResilientEnricher<'_> {
    async fn enrich(&self, request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError> {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, self.inner.enrich(request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(enrichment) => {
                    debug!(enricher = self.inner.name(), attempt, "Enrichment succeeded");
                    return Ok(enrichment);
                }
                Err(err) if err.is_transient() && attempt < self.retries => {
                    warn!(enricher = self.inner.name(), attempt, error = %err, "Enrichment failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recitation::types::{ErrorEntry, WordResult, WordStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_result() -> VerificationResult {
        VerificationResult {
            overall_accuracy: 50,
            is_correct: false,
            word_by_word: vec![
                WordResult {
                    original: "قل".into(),
                    recited: Some("قل".into()),
                    status: WordStatus::Correct,
                    position: 1,
                },
                WordResult {
                    original: "هو".into(),
                    recited: Some("هم".into()),
                    status: WordStatus::Incorrect,
                    position: 2,
                },
            ],
            extra_words: vec![],
            errors: vec![ErrorEntry {
                kind: ErrorKind::Substitution,
                position: 2,
                original: "هو".into(),
                recited: "هم".into(),
                suggestion: Some("Recite \"هو\" instead of \"هم\".".into()),
            }],
            summary: None,
            encouragement: None,
        }
    }

    /// Fails with the given error a number of times, then succeeds.
    struct FlakyEnricher {
        failures: usize,
        error: ProviderError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecitationEnricher for FlakyEnricher {
        async fn enrich(&self, _request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(Enrichment {
                    summary: Some("ok".into()),
                    ..Enrichment::default()
                })
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    struct SlowEnricher;

    #[async_trait]
    impl RecitationEnricher for SlowEnricher {
        async fn enrich(&self, _request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Enrichment::default())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn request<'a>(result: &'a VerificationResult, ctx: &'a VerificationContext) -> EnrichmentRequest<'a> {
        EnrichmentRequest {
            transcription: "قل هم",
            reference: "قل هو",
            result,
            context: ctx,
        }
    }

    #[test]
    fn test_apply_only_retags_substitutions() {
        let mut result = sample_result();
        let before = (result.overall_accuracy, result.is_correct, result.word_by_word.clone());
        Enrichment {
            summary: Some("Nearly there".into()),
            encouragement: Some("  ".into()),
            suggestions: vec![
                SuggestionOverride { position: 2, suggestion: "Round the waw".into() },
                SuggestionOverride { position: 9, suggestion: "ignored".into() },
            ],
            pronunciation_positions: vec![2, 7],
        }
        .apply_to(&mut result);

        assert_eq!(before, (result.overall_accuracy, result.is_correct, result.word_by_word.clone()));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::Pronunciation);
        assert_eq!(result.errors[0].suggestion.as_deref(), Some("Round the waw"));
        assert_eq!(result.summary.as_deref(), Some("Nearly there"));
        assert!(result.encouragement.is_none());
    }

    #[tokio::test]
    async fn test_local_feedback_mentions_counts() {
        let result = sample_result();
        let ctx = VerificationContext::default();
        let enrichment = LocalFeedbackEnricher.enrich(&request(&result, &ctx)).await.unwrap();
        let summary = enrichment.summary.unwrap();
        assert!(summary.contains("1 of 2"));
        assert!(summary.contains("1 word substituted"));
        assert!(enrichment.encouragement.is_some());
    }

    #[tokio::test]
    async fn test_retries_transient_failure_once() {
        let flaky = FlakyEnricher {
            failures: 1,
            error: ProviderError::Transient("503".into()),
            calls: AtomicUsize::new(0),
        };
        let result = sample_result();
        let ctx = VerificationContext::default();
        let resilient = ResilientEnricher::new(&flaky, Duration::from_millis(500), 1);

        let enrichment = resilient.enrich(&request(&result, &ctx)).await.unwrap();
        assert_eq!(enrichment.summary.as_deref(), Some("ok"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_single_retry() {
        let flaky = FlakyEnricher {
            failures: 5,
            error: ProviderError::Transient("reset".into()),
            calls: AtomicUsize::new(0),
        };
        let result = sample_result();
        let ctx = VerificationContext::default();
        let resilient = ResilientEnricher::new(&flaky, Duration::from_millis(500), 1);

        assert!(resilient.enrich(&request(&result, &ctx)).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let flaky = FlakyEnricher {
            failures: 5,
            error: ProviderError::Rejected("401".into()),
            calls: AtomicUsize::new(0),
        };
        let result = sample_result();
        let ctx = VerificationContext::default();
        let resilient = ResilientEnricher::new(&flaky, Duration::from_millis(500), 1);

        let err = resilient.enrich(&request(&result, &ctx)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_reported_as_timeout() {
        let result = sample_result();
        let ctx = VerificationContext::default();
        let resilient = ResilientEnricher::new(&SlowEnricher, Duration::from_millis(100), 0);

        let err = resilient.enrich(&request(&result, &ctx)).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout(100));
    }
}
