//! # Recitation Verification Handlers
//!
//! ## Available Endpoints:
//! - `POST /verify` - Word-by-word verification with feedback
//! - `POST /verify/quick` - Single similarity score, no alignment

use crate::error::{AppError, AppResult};
use crate::recitation::normalize::tokenize;
use crate::recitation::types::VerseSpan;
use crate::recitation::{quick_verify, VerificationContext};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

/// Request body for a full verification.
///
/// Missing text fields are treated as empty, so an empty transcription
/// scores 0 rather than failing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub surah_number: Option<u16>,
    #[serde(default)]
    pub verse_range: Option<VerseSpan>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickVerifyRequest {
    pub transcription: String,
    pub original_text: String,
}

/// Reject a text with more words than `performance.max_words`.
pub(crate) fn ensure_word_limit(field: &str, text: &str, max_words: usize) -> AppResult<()> {
    let words = tokenize(text).len();
    if words > max_words {
        return Err(AppError::ValidationError(format!(
            "{} has {} words, at most {} are accepted",
            field, words, max_words
        )));
    }
    Ok(())
}

/// Verify a transcription against the reference text.
///
/// ## Endpoint: `POST /api/v1/verify`
///
/// ## Response:
/// ```json
/// {
///   "success": true,
///   "verification": {
///     "overallAccuracy": 75,
///     "isCorrect": false,
///     "wordByWord": [{"original": "أَحَدٌ", "recited": null, "status": "missed", "position": 4}],
///     "extraWords": [],
///     "errors": [{"type": "omission", "position": 4, "original": "أَحَدٌ", "recited": ""}],
///     "summary": "...",
///     "encouragement": "..."
///   }
/// }
/// ```
///
/// Returns 503 `verification_unavailable` when enrichment fails and the
/// configured policy is `propagate`, and 400 `validation_error` when either
/// text is longer than `performance.max_words`.
pub async fn verify_recitation(
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let config = state.get_config();
    let transcription = request.transcription.as_deref().unwrap_or_default();
    let original_text = request.original_text.as_deref().unwrap_or_default();
    ensure_word_limit("transcription", transcription, config.performance.max_words)?;
    ensure_word_limit("originalText", original_text, config.performance.max_words)?;

    let settings = config.verification_settings();
    let context = VerificationContext {
        surah_number: request.surah_number,
        verse_range: request.verse_range,
    };

    let verification = match state
        .services
        .verifier
        .verify(transcription, original_text, &context, &settings)
        .await
    {
        Ok(verification) => verification,
        Err(err) => {
            state.record_enrichment_failure();
            return Err(err.into());
        }
    };
    state.record_verification(&verification.enrichment);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "verification": verification.result
    })))
}

/// Character-level similarity between the two texts.
///
/// ## Endpoint: `POST /api/v1/verify/quick`
///
/// ## Response:
/// ```json
/// { "success": true, "accuracy": 92, "isCorrect": true }
/// ```
pub async fn quick_verify_recitation(
    state: web::Data<AppState>,
    body: web::Json<QuickVerifyRequest>,
) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let request = body.into_inner();
    ensure_word_limit("transcription", &request.transcription, config.performance.max_words)?;
    ensure_word_limit("originalText", &request.original_text, config.performance.max_words)?;

    let pass_threshold = config.verification.pass_threshold;
    let score = web::block(move || quick_verify(&request.transcription, &request.original_text, pass_threshold))
        .await
        .map_err(|e| AppError::Internal(format!("scoring task failed: {}", e)))?;
    state.record_quick_verification();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "accuracy": score.accuracy,
        "isCorrect": score.is_correct
    })))
}

#[cfg(test)]
mod tests {
    use crate::error::ProviderError;
    use crate::handlers::configure;
    use crate::recitation::{Enrichment, EnrichmentRequest, FailurePolicy, RecitationEnricher};
    use crate::state::test_support::{services_with, test_state};
    use crate::config::AppConfig;
    use crate::state::AppState;
    use actix_web::{test, web, App};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct DownEnricher;

    #[async_trait]
    impl RecitationEnricher for DownEnricher {
        async fn enrich(&self, _request: &EnrichmentRequest<'_>) -> Result<Enrichment, ProviderError> {
            Err(ProviderError::Unavailable("feedback service offline".to_string()))
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    fn state_with_down_enricher(policy: FailurePolicy) -> AppState {
        let mut config = AppConfig::default();
        config.verification.on_enrichment_failure = policy;
        AppState::new(config, services_with(Arc::new(DownEnricher)))
    }

    #[actix_web::test]
    async fn test_quick_verify_identical() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/verify/quick")
            .set_json(json!({"transcription": "قل هو الله أحد", "originalText": "قُلْ هُوَ اللَّهُ أَحَدٌ"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["accuracy"], 100);
        assert_eq!(body["isCorrect"], true);
        assert_eq!(state.get_metrics_snapshot().quick_verifications, 1);
    }

    #[actix_web::test]
    async fn test_wrong_type_is_invalid_input() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/verify/quick")
            .set_json(json!({"transcription": 42, "originalText": "قل"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "invalid_input");

        let req = test::TestRequest::post()
            .uri("/api/v1/verify")
            .set_json(json!({"transcription": ["قل"], "originalText": "قل"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn test_verify_reports_word_results() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/verify")
            .set_json(json!({
                "transcription": "قل هو الله",
                "originalText": "قُلْ هُوَ ٱللَّهُ أَحَدٌ",
                "surahNumber": 112,
                "verseRange": {"start": 1, "end": 1}
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let verification = &body["verification"];
        assert_eq!(verification["overallAccuracy"], 75);
        assert_eq!(verification["isCorrect"], false);
        assert_eq!(verification["wordByWord"][3]["status"], "missed");
        assert_eq!(verification["errors"][0]["type"], "omission");
        assert_eq!(verification["errors"][0]["position"], 4);
        assert!(verification["summary"].is_string());
        assert_eq!(state.get_metrics_snapshot().verifications, 1);
    }

    #[actix_web::test]
    async fn test_missing_transcription_scores_zero() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/verify")
            .set_json(json!({"originalText": "ٱللَّهُ ٱلصَّمَدُ"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["verification"]["overallAccuracy"], 0);
        assert_eq!(body["verification"]["errors"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn test_propagate_policy_returns_503() {
        let state = state_with_down_enricher(FailurePolicy::Propagate);
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/verify")
            .set_json(json!({"transcription": "قل هو", "originalText": "قل هو"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "verification_unavailable");
        assert_eq!(state.get_metrics_snapshot().enrichment_failures, 1);
    }

    #[actix_web::test]
    async fn test_oversized_texts_are_rejected() {
        let mut config = AppConfig::default();
        config.performance.max_words = 3;
        let state = AppState::new(config, services_with(Arc::new(crate::recitation::LocalFeedbackEnricher)));
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        for uri in ["/api/v1/verify", "/api/v1/verify/quick"] {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(json!({"transcription": "قل هو الله احد", "originalText": "قل هو الله"}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400, "{}", uri);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"]["type"], "validation_error");
        }

        // separators and punctuation do not count towards the limit
        let req = test::TestRequest::post()
            .uri("/api/v1/verify")
            .set_json(json!({"transcription": "قل هو الله ۝ .", "originalText": "قل هو الله"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["verification"]["overallAccuracy"], 100);
        assert_eq!(state.get_metrics_snapshot().verifications, 1);
        assert_eq!(state.get_metrics_snapshot().quick_verifications, 0);
    }

    #[actix_web::test]
    async fn test_degrade_policy_keeps_score() {
        let state = state_with_down_enricher(FailurePolicy::Degrade);
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/verify")
            .set_json(json!({"transcription": "قل هو", "originalText": "قل هو"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["verification"]["overallAccuracy"], 100);
        assert!(body["verification"].get("summary").is_none());
        assert_eq!(state.get_metrics_snapshot().degraded_verifications, 1);
    }
}
