use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

/// ## Endpoint: `GET /api/v1/config`
///
/// The OpenAI key is never echoed; only whether one is configured.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config.public_view()
    })))
}

/// ## Endpoint: `PUT /api/v1/config`
///
/// ## Request Body:
/// ```json
/// { "verification": { "pass_threshold": 90, "on_enrichment_failure": "propagate" } }
/// ```
pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;
    info!(
        pass_threshold = current_config.verification.pass_threshold,
        policy = ?current_config.verification.on_enrichment_failure,
        "Configuration updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": current_config.public_view()
    })))
}
