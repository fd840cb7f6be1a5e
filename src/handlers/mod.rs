//! HTTP request handlers, one module per resource.
//!
//! [`configure`] registers every route under `/api/v1` so that `main` and the
//! handler tests build the same application.

pub mod attempts;
pub mod config;
pub mod form;
pub mod practice;
pub mod quran;
pub mod transcribe;
pub mod verify;

pub use attempts::*;
pub use config::*;
pub use practice::*;
pub use quran::*;
pub use transcribe::*;
pub use verify::*;

use crate::{error::AppError, health};
use actix_web::web;

/// Turn body and query extraction failures into the standard error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1024 * 1024)
        .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

/// Routes under `/api/v1`.
///
/// `/attempts/stats/summary` is registered ahead of `/attempts/{id}` so the
/// literal path wins.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(health::health_check))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .route("/config", web::get().to(get_config))
                .route("/config", web::put().to(update_config))
                .route("/verify", web::post().to(verify_recitation))
                .route("/verify/quick", web::post().to(quick_verify_recitation))
                .route("/transcribe", web::post().to(transcribe_audio))
                .route("/quran/surahs/{surah}/verses", web::get().to(get_surah_verses))
                .route("/practice", web::post().to(practice_recitation))
                .route("/attempts", web::get().to(list_attempts))
                .route("/attempts", web::post().to(save_attempt))
                .route("/attempts/stats/summary", web::get().to(attempt_stats))
                .route("/attempts/{id}", web::get().to(get_attempt))
                .route("/attempts/{id}", web::delete().to(delete_attempt)),
        )
        .route("/health", web::get().to(health::health_check));
}
