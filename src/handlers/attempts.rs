//! # Attempt History Handlers
//!
//! ## Available Endpoints:
//! - `GET /attempts` - Paginated history, newest first
//! - `POST /attempts` - Save an attempt scored on the client
//! - `GET /attempts/{id}` - One attempt
//! - `DELETE /attempts/{id}` - Remove an attempt
//! - `GET /attempts/stats/summary` - Practice statistics

use crate::attempts::{compute_stats, AttemptQuery, AttemptStatus, NewAttempt};
use crate::error::{AppError, AppResult};
use crate::recitation::types::{ErrorEntry, ExtraWord, WordResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct AttemptListParams {
    pub surah: Option<u16>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Request body for `POST /attempts`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAttemptRequest {
    pub surah_number: u16,
    pub surah_name: Option<String>,
    pub verse_start: u16,
    pub verse_end: u16,
    pub transcription: String,
    pub original_text: String,
    pub accuracy: u8,
    #[serde(default)]
    pub word_results: Vec<WordResult>,
    #[serde(default)]
    pub extra_words: Vec<ExtraWord>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    #[serde(default, alias = "duration")]
    pub duration_seconds: Option<f64>,
    /// Derived from the pass threshold when absent
    pub status: Option<AttemptStatus>,
}

impl SaveAttemptRequest {
    fn into_new_attempt(self, pass_threshold: u8) -> AppResult<NewAttempt> {
        crate::quran::validate_range(self.surah_number, self.verse_start, self.verse_end)?;
        if self.accuracy > 100 {
            return Err(AppError::ValidationError(format!(
                "accuracy must be between 0 and 100, got {}",
                self.accuracy
            )));
        }

        Ok(NewAttempt {
            surah_number: self.surah_number,
            surah_name: self.surah_name,
            verse_start: self.verse_start,
            verse_end: self.verse_end,
            transcription: self.transcription,
            original_text: self.original_text,
            accuracy: self.accuracy,
            word_results: self.word_results,
            extra_words: self.extra_words,
            errors: self.errors,
            duration_seconds: self.duration_seconds,
            status: self
                .status
                .unwrap_or_else(|| AttemptStatus::from_accuracy(self.accuracy, pass_threshold)),
        })
    }
}

fn parse_attempt_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("Attempt {} not found", raw)))
}

/// ## Endpoint: `GET /api/v1/attempts?surah=112&limit=20&offset=0`
///
/// `limit` defaults to 20 and is capped at `performance.max_page_size`.
pub async fn list_attempts(
    state: web::Data<AppState>,
    query: web::Query<AttemptListParams>,
) -> AppResult<HttpResponse> {
    let max_page_size = state.get_config().performance.max_page_size;
    let query = AttemptQuery {
        surah: query.surah,
        limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max_page_size),
        offset: query.offset.unwrap_or(0),
    };

    let page = state.services.attempts.list(query).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "attempts": page.attempts,
        "total": page.total,
        "limit": query.limit,
        "offset": query.offset
    })))
}

/// ## Endpoint: `POST /api/v1/attempts`
pub async fn save_attempt(
    state: web::Data<AppState>,
    body: web::Json<SaveAttemptRequest>,
) -> AppResult<HttpResponse> {
    let pass_threshold = state.get_config().verification.pass_threshold;
    let attempt = body.into_inner().into_new_attempt(pass_threshold)?;
    let record = state.services.attempts.insert(attempt).await?;
    info!(id = %record.id, surah = record.surah_number, accuracy = record.accuracy, "Attempt saved");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "attempt": record
    })))
}

/// ## Endpoint: `GET /api/v1/attempts/{id}`
pub async fn get_attempt(state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let id = parse_attempt_id(&path)?;
    let record = state
        .services
        .attempts
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", id)))?;

    Ok(HttpResponse::Ok().json(json!({ "attempt": record })))
}

/// ## Endpoint: `DELETE /api/v1/attempts/{id}`
pub async fn delete_attempt(state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let id = parse_attempt_id(&path)?;
    if !state.services.attempts.delete(id).await? {
        return Err(AppError::NotFound(format!("Attempt {} not found", id)));
    }
    info!(%id, "Attempt deleted");

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// ## Endpoint: `GET /api/v1/attempts/stats/summary`
///
/// ## Response:
/// ```json
/// {
///   "stats": {
///     "totalAttempts": 12,
///     "averageAccuracy": 81,
///     "passedCount": 7,
///     "needsReviewCount": 5,
///     "uniqueSurahs": 3,
///     "streakDays": 4,
///     "lastPractice": "2024-01-15T10:30:00Z"
///   }
/// }
/// ```
pub async fn attempt_stats(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let summaries = state.services.attempts.all_for_stats().await?;
    let stats = compute_stats(&summaries, Utc::now().date_naive());

    Ok(HttpResponse::Ok().json(json!({ "stats": stats })))
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure;
    use crate::state::test_support::test_state;
    use actix_web::{test, web, App};
    use serde_json::{json, Value};

    fn attempt_body(surah: u16, accuracy: u8) -> Value {
        json!({
            "surahNumber": surah,
            "surahName": "Al-Ikhlas",
            "verseStart": 1,
            "verseEnd": 4,
            "transcription": "قل هو الله احد",
            "originalText": "قُلْ هُوَ ٱللَّهُ أَحَدٌ",
            "accuracy": accuracy,
            "duration": 3.5
        })
    }

    #[actix_web::test]
    async fn test_save_get_delete() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/attempts")
            .set_json(attempt_body(112, 90))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["attempt"]["status"], "passed");
        assert_eq!(body["attempt"]["duration_seconds"], 3.5);
        let id = body["attempt"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri(&format!("/api/v1/attempts/{}", id)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["attempt"]["surah_number"], 112);

        let req = test::TestRequest::delete().uri(&format!("/api/v1/attempts/{}", id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::get().uri(&format!("/api/v1/attempts/{}", id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn test_unknown_attempt_is_404() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/attempts/6f1c1b8e-6f55-4a43-9d7e-2a8c4e5b9f10")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "not_found");

        let req = test::TestRequest::delete().uri("/api/v1/attempts/not-a-uuid").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn test_list_filters_and_clamps() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        for (surah, accuracy) in [(112, 90), (112, 40), (1, 100)] {
            let req = test::TestRequest::post()
                .uri("/api/v1/attempts")
                .set_json(attempt_body(surah, accuracy))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), 200);
        }

        let req = test::TestRequest::get().uri("/api/v1/attempts?surah=112").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["attempts"][0]["status"], "needs_review");

        let req = test::TestRequest::get().uri("/api/v1/attempts?limit=1000&offset=1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["limit"], 100);
        assert_eq!(body["total"], 3);
        assert_eq!(body["attempts"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/attempts?offset={}", usize::MAX))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 3);
        assert!(body["attempts"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_save_keeps_extra_words() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let mut body = attempt_body(112, 100);
        body["extraWords"] = json!([{"recited": "الله", "afterPosition": 3, "status": "extra"}]);
        let req = test::TestRequest::post().uri("/api/v1/attempts").set_json(body).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["attempt"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri(&format!("/api/v1/attempts/{}", id)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["attempt"]["extra_words"][0]["afterPosition"], 3);
    }

    #[actix_web::test]
    async fn test_stats_summary() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        for (surah, accuracy) in [(112, 90), (1, 70)] {
            let req = test::TestRequest::post()
                .uri("/api/v1/attempts")
                .set_json(attempt_body(surah, accuracy))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::get().uri("/api/v1/attempts/stats/summary").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let stats = &body["stats"];
        assert_eq!(stats["totalAttempts"], 2);
        assert_eq!(stats["averageAccuracy"], 80);
        assert_eq!(stats["passedCount"], 1);
        assert_eq!(stats["needsReviewCount"], 1);
        assert_eq!(stats["uniqueSurahs"], 2);
        assert_eq!(stats["streakDays"], 1);
    }

    #[actix_web::test]
    async fn test_save_rejects_bad_range() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let mut body = attempt_body(112, 90);
        body["verseStart"] = json!(5);
        let req = test::TestRequest::post().uri("/api/v1/attempts").set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
