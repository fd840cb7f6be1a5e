use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::process;

fn error_rate(errors: u64, requests: u64) -> f64 {
    if requests > 0 {
        errors as f64 / requests as f64
    } else {
        0.0
    }
}

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let services = &state.services;

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(metrics.error_count, metrics.request_count)
        },
        "memory": get_memory_info(),
        "verification": {
            "enrichment": services.verifier.enricher_name(),
            "on_enrichment_failure": config.verification.on_enrichment_failure,
            "pass_threshold": config.verification.pass_threshold
        },
        "providers": {
            "transcription": services.transcriber.name(),
            "verses": services.verses.name(),
            "openai_api_key_configured": config.has_openai_key()
        },
        "storage": {
            "backend": services.attempts.backend_name()
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(metrics.error_count, metrics.request_count),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "verification": {
            "verifications": metrics.verifications,
            "quick_verifications": metrics.quick_verifications,
            "enrichment_failures": metrics.enrichment_failures,
            "degraded_verifications": metrics.degraded_verifications
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info(),
        "performance": {
            "max_upload_bytes": state.get_config().performance.max_upload_bytes,
            "max_page_size": state.get_config().performance.max_page_size,
            "max_words": state.get_config().performance.max_words
        }
    }))
}

fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", process::id())) {
            let read_kb = |prefix: &str| {
                status
                    .lines()
                    .find(|line| line.starts_with(prefix))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .unwrap_or(0)
                    * 1024
            };

            return json!({
                "resident_memory_bytes": read_kb("VmRSS:"),
                "virtual_memory_bytes": read_kb("VmSize:"),
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": format!("Memory info not available for process {}", process::id())
    })
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure;
    use crate::state::test_support::test_state;
    use actix_web::{test, web, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_health_reports_collaborators() {
        let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"]["name"], "hifz-verify-backend");
        assert_eq!(body["verification"]["enrichment"], "local");
        assert_eq!(body["storage"]["backend"], "memory");
    }

    #[actix_web::test]
    async fn test_metrics_count_verifications() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/verify/quick")
            .set_json(json!({"transcription": "الحمد", "originalText": "الحمد"}))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/api/v1/metrics").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["verification"]["quick_verifications"], 1);
    }
}
