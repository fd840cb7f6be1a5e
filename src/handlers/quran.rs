use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct VerseQuery {
    pub start: Option<u16>,
    pub end: Option<u16>,
}

/// Fetch a range of verses from one surah.
///
/// ## Endpoint: `GET /api/v1/quran/surahs/{surah}/verses?start=1&end=4`
///
/// `start` defaults to 1 and `end` to `start`, so a bare request returns the
/// first verse.
///
/// ## Response:
/// ```json
/// {
///   "success": true,
///   "surah": 112,
///   "verses": [{"number": 1, "text": "قُلْ هُوَ ٱللَّهُ أَحَدٌ"}],
///   "combinedText": "قُلْ هُوَ ٱللَّهُ أَحَدٌ"
/// }
/// ```
pub async fn get_surah_verses(
    state: web::Data<AppState>,
    path: web::Path<u16>,
    query: web::Query<VerseQuery>,
) -> AppResult<HttpResponse> {
    let surah = path.into_inner();
    let start = query.start.unwrap_or(1);
    let end = query.end.unwrap_or(start);

    let range = state.services.verses.get_verses(surah, start, end).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "surah": range.surah,
        "verses": range.verses,
        "combinedText": range.combined_text
    })))
}
