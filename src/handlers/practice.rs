use crate::attempts::{AttemptStatus, NewAttempt};
use crate::error::{AppError, AppResult};
use crate::handlers::form::read_audio_form;
use crate::handlers::verify::ensure_word_limit;
use crate::recitation::types::VerseSpan;
use crate::recitation::VerificationContext;
use crate::state::AppState;
use crate::transcription::validate_upload;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

/// Record, check and store one practice attempt.
///
/// ## Endpoint: `POST /api/v1/practice`
///
/// ## Request:
/// Multipart form data with fields `audio`, `surahNumber`, `verseStart`,
/// `verseEnd` and an optional `surahName`.
///
/// The verse range is checked before the audio is sent for transcription, so
/// an impossible range never costs a provider call.
///
/// ## Response:
/// ```json
/// { "success": true, "attempt": { "id": "...", "status": "passed", ... }, "verification": { ... } }
/// ```
pub async fn practice_recitation(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let max_bytes = config.performance.max_upload_bytes;

    let mut form = read_audio_form(payload, max_bytes).await?;
    let surah_number = form.number("surahNumber")?;
    let verse_start = form.number("verseStart")?;
    let verse_end = form.number("verseEnd")?;
    let surah_name = form.text("surahName").map(str::to_string);
    crate::quran::validate_range(surah_number, verse_start, verse_end)?;

    let upload = form.require_audio()?;
    validate_upload(&upload, max_bytes)?;

    let services = &state.services;
    let transcript = services.transcriber.transcribe(upload).await?;
    let range = services.verses.get_verses(surah_number, verse_start, verse_end).await?;
    ensure_word_limit("transcription", &transcript.text, config.performance.max_words)?;
    ensure_word_limit("verse range", &range.combined_text, config.performance.max_words)?;

    let context = VerificationContext {
        surah_number: Some(surah_number),
        verse_range: Some(VerseSpan {
            start: verse_start,
            end: verse_end,
        }),
    };
    let settings = config.verification_settings();
    let verification = services
        .verifier
        .verify(&transcript.text, &range.combined_text, &context, &settings)
        .await
        .map_err(|err| {
            state.record_enrichment_failure();
            AppError::from(err)
        })?;
    state.record_verification(&verification.enrichment);

    let result = verification.result;
    let record = services
        .attempts
        .insert(NewAttempt {
            surah_number,
            surah_name,
            verse_start,
            verse_end,
            transcription: transcript.text,
            original_text: range.combined_text,
            accuracy: result.overall_accuracy,
            word_results: result.word_by_word.clone(),
            extra_words: result.extra_words.clone(),
            errors: result.errors.clone(),
            duration_seconds: transcript.duration_seconds,
            status: AttemptStatus::from_accuracy(result.overall_accuracy, settings.pass_threshold),
        })
        .await?;

    info!(
        id = %record.id,
        surah = surah_number,
        verse_start,
        verse_end,
        accuracy = record.accuracy,
        status = record.status.as_str(),
        "Practice attempt recorded"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "attempt": record,
        "verification": result
    })))
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure;
    use crate::handlers::test_support::{multipart_body, multipart_content_type, Part};
    use crate::attempts::AttemptQuery;
    use crate::config::AppConfig;
    use crate::recitation::LocalFeedbackEnricher;
    use crate::state::test_support::{services_with, test_state, FixedTranscriber};
    use crate::state::AppState;
    use actix_web::{test, web, App};
    use serde_json::Value;
    use std::sync::Arc;

    fn practice_form<'a>(surah: &'a str, start: &'a str, end: &'a str) -> Vec<u8> {
        multipart_body(&[
            Part::Text("surahNumber", surah),
            Part::Text("verseStart", start),
            Part::Text("verseEnd", end),
            Part::Text("surahName", "Al-Ikhlas"),
            Part::File {
                name: "audio",
                filename: "take1.webm",
                content_type: "audio/webm;codecs=opus",
                bytes: b"opus frames",
            },
        ])
    }

    #[actix_web::test]
    async fn test_practice_stores_attempt() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/practice")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(practice_form("112", "1", "1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["verification"]["overallAccuracy"], 100);
        assert_eq!(body["attempt"]["status"], "passed");
        assert_eq!(body["attempt"]["surah_name"], "Al-Ikhlas");
        assert_eq!(body["attempt"]["duration_seconds"], 2.5);

        let req = test::TestRequest::get().uri("/api/v1/attempts").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(state.get_metrics_snapshot().verifications, 1);
    }

    #[actix_web::test]
    async fn test_partial_recitation_needs_review() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        // The fake transcriber always hears verse 1, so verses 1-2 leave two words missed.
        let req = test::TestRequest::post()
            .uri("/api/v1/practice")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(practice_form("112", "1", "2"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["verification"]["overallAccuracy"], 67);
        assert_eq!(body["attempt"]["status"], "needs_review");
    }

    #[actix_web::test]
    async fn test_practice_keeps_extra_words() {
        let mut services = services_with(Arc::new(LocalFeedbackEnricher));
        services.transcriber = Arc::new(FixedTranscriber("قل هو الله الله احد".to_string()));
        let state = AppState::new(AppConfig::default(), services);
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/practice")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(practice_form("112", "1", "1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["verification"]["extraWords"].as_array().unwrap().len(), 1);

        let id = body["attempt"]["id"].as_str().unwrap().to_string();
        let req = test::TestRequest::get().uri(&format!("/api/v1/attempts/{}", id)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let extra = &body["attempt"]["extra_words"];
        assert_eq!(extra.as_array().unwrap().len(), 1);
        assert_eq!(extra[0]["recited"], "الله");
    }

    #[actix_web::test]
    async fn test_practice_rejects_overlong_recitation() {
        let mut config = AppConfig::default();
        config.performance.max_words = 3;
        let state = AppState::new(config, services_with(Arc::new(LocalFeedbackEnricher)));
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/practice")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(practice_form("112", "1", "1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "validation_error");
        let page = state.services.attempts.list(AttemptQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[actix_web::test]
    async fn test_practice_validates_fields() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/practice")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(practice_form("112", "3", "1"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/api/v1/practice")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(practice_form("abc", "1", "1"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }
}
