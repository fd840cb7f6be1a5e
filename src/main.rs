//! # Hifz Verify Backend - Main Application Entry Point
//!
//! HTTP service that checks a memorized Quran recitation against the
//! canonical text, word by word, and keeps a practice history.
//!
//! ## Application Architecture:
//! - **recitation**: normalization, quick scoring, word alignment and feedback
//! - **transcription**: speech-to-text seam and upload checks
//! - **quran**: reference verse ranges
//! - **providers**: HTTP-backed implementations of the seams (OpenAI, AlQuran Cloud)
//! - **attempts**: practice history stores and statistics
//! - **config / state / error**: configuration layering, shared state, HTTP errors
//! - **handlers / health / middleware**: the actix-web surface

mod attempts;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod providers;
mod quran;
mod recitation;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use crate::config::AppConfig;
use crate::state::{AppState, Services};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once a termination signal arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting hifz-verify-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        enrichment = ?config.verification.enrichment,
        storage = ?config.storage.backend,
        "Configuration loaded"
    );
    if !config.has_openai_key() {
        warn!("OPENAI_API_KEY is not set; transcription requests will fail with 502");
    }

    let services = Services::from_config(&config).context("initializing collaborators")?;
    let app_state = AppState::new(config.clone(), services);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    // Multipart bodies carry the audio plus a few short text fields.
    let payload_limit = config.performance.max_upload_bytes + 64 * 1024;

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::PayloadConfig::new(payload_limit))
            // Middleware runs in reverse order of registration for responses
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("binding {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// `RUST_LOG` overrides the default `hifz_verify_backend=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hifz_verify_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

/// Listen for SIGTERM and SIGINT and raise the shutdown flag.
///
/// If a handler cannot be installed the server keeps running and can still
/// be stopped by actix's own signal handling.
fn setup_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async {
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
