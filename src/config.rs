//! # Configuration Management
//!
//! Loads the service configuration from several sources and checks it before
//! the server starts.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Special environment variables: `HOST`, `PORT`, `OPENAI_API_KEY`
//! 2. Prefixed environment variables, with `__` between nesting levels
//!    (e.g. `APP_VERIFICATION__PASS_THRESHOLD=90`)
//! 3. Configuration file (`config.toml`)
//! 4. Default values (defined in the Default impl)
//!
//! ## Sections:
//! - **server**: bind address
//! - **verification**: scoring thresholds and the enrichment pass
//! - **providers**: OpenAI and alquran.cloud endpoints
//! - **storage**: where practice attempts are kept
//! - **performance**: upload and paging limits

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;

use crate::recitation::{FailurePolicy, VerificationSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub verification: VerificationConfig,
    pub providers: ProvidersConfig,
    pub storage: StorageConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which narrative provider runs after the deterministic scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    /// Template feedback computed in-process
    Local,
    /// OpenAI-compatible chat completion
    Openai,
    /// No summary or encouragement
    None,
}

/// Scoring thresholds and enrichment behavior.
///
/// `pass_threshold`, `near_miss_threshold`, `on_enrichment_failure` and
/// `enrichment_timeout_ms` can be changed at runtime through `PUT /config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Minimum accuracy (0-100) for a recitation to count as correct
    pub pass_threshold: u8,
    /// Character similarity at or above which a substitution is a pronunciation slip
    pub near_miss_threshold: f64,
    pub enrichment: EnrichmentMode,
    pub enrichment_timeout_ms: u64,
    pub enrichment_retries: u32,
    pub on_enrichment_failure: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub transcription_language: String,
    pub quran_api_base_url: String,
    pub quran_edition: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub sqlite_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Largest accepted audio upload in bytes
    pub max_upload_bytes: usize,
    /// Upper bound for `limit` on attempt listings
    pub max_page_size: usize,
    /// Longest transcription or reference text, in words, that is scored
    pub max_words: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            verification: VerificationConfig {
                pass_threshold: 85,
                near_miss_threshold: 0.75,
                enrichment: EnrichmentMode::Local,
                enrichment_timeout_ms: 4000,
                enrichment_retries: 1,
                on_enrichment_failure: FailurePolicy::Degrade,
            },
            providers: ProvidersConfig {
                openai_api_key: None,
                openai_base_url: "https://api.openai.com/v1".to_string(),
                chat_model: "gpt-4-turbo-preview".to_string(),
                transcription_model: "whisper-1".to_string(),
                transcription_language: "ar".to_string(),
                quran_api_base_url: "https://api.alquran.cloud/v1".to_string(),
                quran_edition: "quran-uthmani".to_string(),
                request_timeout_ms: 15_000,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                sqlite_path: "hifz_attempts.db".to_string(),
            },
            performance: PerformanceConfig {
                max_upload_bytes: 25 * 1024 * 1024, // Whisper's own upload limit
                max_page_size: 100,
                max_words: 1500,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml` and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_STORAGE__BACKEND=sqlite`: Persist attempts to SQLite
    /// - `APP_VERIFICATION__ON_ENRICHMENT_FAILURE=propagate`: Fail instead of degrading
    /// - `HOST` / `PORT`: Special cases for deployment platforms
    /// - `OPENAI_API_KEY`: Credentials for transcription and OpenAI enrichment
    pub fn load() -> Result<Self> {
        let mut settings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&AppConfig::default())?)
            .add_source(::config::File::with_name("config").required(false))
            .add_source(
                ::config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("providers.openai_api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.verification.pass_threshold > 100 {
            return Err(anyhow::anyhow!("Pass threshold must be between 0 and 100"));
        }

        let near_miss = self.verification.near_miss_threshold;
        if !(near_miss > 0.0 && near_miss <= 1.0) {
            return Err(anyhow::anyhow!("Near-miss threshold must be in (0, 1]"));
        }

        if self.verification.enrichment_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Enrichment timeout must be greater than 0"));
        }

        if self.providers.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Provider request timeout must be greater than 0"));
        }

        if self.performance.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.performance.max_page_size == 0 {
            return Err(anyhow::anyhow!("Max page size must be greater than 0"));
        }

        if self.performance.max_words == 0 {
            return Err(anyhow::anyhow!("Max words must be greater than 0"));
        }

        if self.verification.enrichment == EnrichmentMode::Openai && !self.has_openai_key() {
            return Err(anyhow::anyhow!("OpenAI enrichment requires OPENAI_API_KEY"));
        }

        Ok(())
    }

    pub fn has_openai_key(&self) -> bool {
        self.providers
            .openai_api_key
            .as_deref()
            .map_or(false, |k| !k.trim().is_empty())
    }

    /// Snapshot of the knobs one verification call needs.
    pub fn verification_settings(&self) -> VerificationSettings {
        VerificationSettings {
            pass_threshold: self.verification.pass_threshold,
            near_miss_threshold: self.verification.near_miss_threshold,
            enrichment_timeout: Duration::from_millis(self.verification.enrichment_timeout_ms),
            enrichment_retries: self.verification.enrichment_retries,
            failure_policy: self.verification.on_enrichment_failure,
        }
    }

    /// Apply a partial runtime update.
    ///
    /// Only the verification knobs are adjustable at runtime:
    /// `{"verification": {"pass_threshold": 90, "near_miss_threshold": 0.8,
    /// "on_enrichment_failure": "propagate", "enrichment_timeout_ms": 2000}}`.
    /// Every other key is ignored. A present key with a value of the wrong type
    /// is an error.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(verification) = partial_config.get("verification") {
            if let Some(value) = verification.get("pass_threshold") {
                let threshold = value
                    .as_u64()
                    .filter(|t| *t <= 100)
                    .ok_or_else(|| anyhow::anyhow!("pass_threshold must be an integer between 0 and 100"))?;
                self.verification.pass_threshold = threshold as u8;
            }
            if let Some(value) = verification.get("near_miss_threshold") {
                self.verification.near_miss_threshold = value
                    .as_f64()
                    .ok_or_else(|| anyhow::anyhow!("near_miss_threshold must be a number"))?;
            }
            if let Some(value) = verification.get("on_enrichment_failure") {
                self.verification.on_enrichment_failure = serde_json::from_value(value.clone())
                    .map_err(|_| anyhow::anyhow!("on_enrichment_failure must be \"degrade\" or \"propagate\""))?;
            }
            if let Some(value) = verification.get("enrichment_timeout_ms") {
                self.verification.enrichment_timeout_ms = value
                    .as_u64()
                    .ok_or_else(|| anyhow::anyhow!("enrichment_timeout_ms must be a positive integer"))?;
            }
        }

        self.validate()?;
        Ok(())
    }

    /// JSON view for `GET /config`, with the API key masked.
    pub fn public_view(&self) -> serde_json::Value {
        json!({
            "server": self.server,
            "verification": self.verification,
            "providers": {
                "openai_api_key_configured": self.has_openai_key(),
                "openai_base_url": self.providers.openai_base_url,
                "chat_model": self.providers.chat_model,
                "transcription_model": self.providers.transcription_model,
                "transcription_language": self.providers.transcription_language,
                "quran_api_base_url": self.providers.quran_api_base_url,
                "quran_edition": self.providers.quran_edition,
                "request_timeout_ms": self.providers.request_timeout_ms
            },
            "storage": self.storage,
            "performance": self.performance
        })
    }
}
