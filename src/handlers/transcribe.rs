use crate::error::AppResult;
use crate::handlers::form::read_audio_form;
use crate::state::AppState;
use crate::transcription::validate_upload;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

/// Transcribe an uploaded recitation.
///
/// ## Endpoint: `POST /api/v1/transcribe`
///
/// ## Request:
/// Multipart form data with an audio file field named "audio"
///
/// ## Response:
/// ```json
/// {
///   "success": true,
///   "transcription": { "text": "قل هو الله احد", "language": "ar", "duration": 3.2 }
/// }
/// ```
pub async fn transcribe_audio(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let max_bytes = state.get_config().performance.max_upload_bytes;
    let mut form = read_audio_form(payload, max_bytes).await?;
    let upload = form.require_audio()?;
    validate_upload(&upload, max_bytes)?;

    let size_bytes = upload.bytes.len();
    let transcript = state.services.transcriber.transcribe(upload).await?;
    info!(
        provider = state.services.transcriber.name(),
        size_bytes,
        characters = transcript.text.chars().count(),
        "Audio transcribed"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "transcription": transcript
    })))
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure;
    use crate::handlers::test_support::{multipart_body, multipart_content_type, Part};
    use crate::state::test_support::test_state;
    use actix_web::{test, web, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_transcribe_upload() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let body = multipart_body(&[Part::File {
            name: "audio",
            filename: "recitation.webm",
            content_type: "audio/webm",
            bytes: b"not really opus",
        }]);
        let req = test::TestRequest::post()
            .uri("/api/v1/transcribe")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(body)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["transcription"]["text"], "قل هو الله احد");
        assert_eq!(body["transcription"]["language"], "ar");
        assert_eq!(body["transcription"]["duration"], 2.5);
    }

    #[actix_web::test]
    async fn test_rejects_non_audio() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let body = multipart_body(&[Part::File {
            name: "audio",
            filename: "notes.txt",
            content_type: "text/plain",
            bytes: b"hello",
        }]);
        let req = test::TestRequest::post()
            .uri("/api/v1/transcribe")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_missing_audio_field() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let body = multipart_body(&[Part::Text("surahNumber", "112")]);
        let req = test::TestRequest::post()
            .uri("/api/v1/transcribe")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "validation_error");
    }
}
