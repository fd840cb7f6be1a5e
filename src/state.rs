//! # Application State Management
//!
//! Shared state handed to every HTTP handler through `web::Data<AppState>`.
//!
//! ## What lives here:
//! - **Config**: `Arc<RwLock<AppConfig>>`, readable by many handlers at
//!   once and replaced whole by `PUT /config`
//! - **Metrics**: request counters plus verification outcomes
//! - **Collaborators**: the verifier, transcription provider, verse source
//!   and attempt store, all injected as trait objects
//!
//! ## Arc<RwLock<T>> Pattern
//! Handlers take a lock only long enough to clone or bump a value, so no
//! lock is ever held across an `.await`. A poisoned lock is recovered rather
//! than propagated since every critical section is a plain assignment.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

use crate::attempts::{AttemptStore, MemoryAttemptStore, SqliteAttemptStore};
use crate::config::{AppConfig, EnrichmentMode, StorageBackend};
use crate::providers::{http_client, AlQuranCloudSource, OpenAiConnection, OpenAiEnricher, OpenAiTranscriber};
use crate::quran::VerseSource;
use crate::recitation::{
    EnrichmentOutcome, LocalFeedbackEnricher, NoopEnricher, RecitationEnricher, RecitationVerifier,
};
use crate::transcription::TranscriptionProvider;

/// External collaborators, built once at startup or injected by tests.
#[derive(Clone)]
pub struct Services {
    pub verifier: RecitationVerifier,
    pub transcriber: Arc<dyn TranscriptionProvider>,
    pub verses: Arc<dyn VerseSource>,
    pub attempts: Arc<dyn AttemptStore>,
}

impl Services {
    /// Wire up the providers and store named by the configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = http_client(Duration::from_millis(config.providers.request_timeout_ms))
            .context("building provider HTTP client")?;
        let openai = OpenAiConnection::new(
            client.clone(),
            config.providers.openai_base_url.clone(),
            config.providers.openai_api_key.clone(),
        );

        let enricher: Arc<dyn RecitationEnricher> = match config.verification.enrichment {
            EnrichmentMode::Local => Arc::new(LocalFeedbackEnricher),
            EnrichmentMode::Openai => Arc::new(OpenAiEnricher::new(openai.clone(), config.providers.chat_model.clone())),
            EnrichmentMode::None => Arc::new(NoopEnricher),
        };

        let transcriber = Arc::new(OpenAiTranscriber::new(
            openai,
            config.providers.transcription_model.clone(),
            config.providers.transcription_language.clone(),
        ));

        let verses = Arc::new(AlQuranCloudSource::new(
            client,
            config.providers.quran_api_base_url.clone(),
            config.providers.quran_edition.clone(),
        ));

        let attempts: Arc<dyn AttemptStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryAttemptStore::new()),
            StorageBackend::Sqlite => Arc::new(
                SqliteAttemptStore::open(&config.storage.sqlite_path)
                    .with_context(|| format!("opening attempt store at {}", config.storage.sqlite_path))?,
            ),
        };

        info!(
            enrichment = enricher.name(),
            storage = attempts.backend_name(),
            "Collaborators initialized"
        );

        Ok(Self {
            verifier: RecitationVerifier::new(enricher),
            transcriber,
            verses,
            attempts,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (constantly being updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,

    pub services: Services,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of error responses since server start
    pub error_count: u64,

    /// Full verifications that produced a result
    pub verifications: u64,

    /// Quick similarity checks
    pub quick_verifications: u64,

    /// Enrichment passes that failed after their retry, whatever the policy
    pub enrichment_failures: u64,

    /// Verifications returned without narrative text because enrichment failed
    pub degraded_verifications: u64,

    /// Key: endpoint name (e.g., "GET /api/v1/health")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, services: Services) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            services,
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the configuration if it passes validation.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap_or_else(PoisonError::into_inner) = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn with_metrics(&self, update: impl FnOnce(&mut AppMetrics)) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut metrics);
    }

    pub fn increment_request_count(&self) {
        self.with_metrics(|m| m.request_count += 1);
    }

    pub fn increment_error_count(&self) {
        self.with_metrics(|m| m.error_count += 1);
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// The first time we see an endpoint, we create a new EndpointMetric with
    /// default values.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        self.with_metrics(|m| {
            let endpoint_metric = m.endpoint_metrics.entry(endpoint.to_string()).or_default();
            endpoint_metric.request_count += 1;
            endpoint_metric.total_duration_ms += duration_ms;
            if is_error {
                endpoint_metric.error_count += 1;
            }
        });
    }

    pub fn record_verification(&self, outcome: &EnrichmentOutcome) {
        self.with_metrics(|m| {
            m.verifications += 1;
            if let EnrichmentOutcome::Degraded(_) = outcome {
                m.enrichment_failures += 1;
                m.degraded_verifications += 1;
            }
        });
    }

    /// A verification failed outright because enrichment failed
    pub fn record_enrichment_failure(&self) {
        self.with_metrics(|m| m.enrichment_failures += 1);
    }

    pub fn record_quick_verification(&self) {
        self.with_metrics(|m| m.quick_verifications += 1);
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average = Total Duration ÷ Number of Requests
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate as a fraction (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
