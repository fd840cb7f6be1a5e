//! # Error Handling
//!
//! Three layers of errors live here:
//!
//! - **ProviderError**: what an external collaborator (speech-to-text, verse
//!   source, narrative enrichment) can report. Each variant knows whether it
//!   is worth retrying.
//! - **VerificationError**: the only ways the verification engine itself can
//!   fail. A 0% score is *not* one of them; that is a normal result.
//! - **AppError**: what an HTTP handler returns. It converts into a JSON
//!   response with a stable machine-readable `type` so that clients can tell
//!   "nothing matched" apart from "please retry".
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "verification_unavailable",
//!     "message": "Narrative provider timed out after 4000ms",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Failures reported by external collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Provider is not configured or cannot be reached at all
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider did not answer within the time budget
    #[error("provider timed out after {0}ms")]
    Timeout(u64),

    /// Network failure, rate limit or 5xx; worth one more try
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Provider refused the request (4xx other than 429)
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// Provider answered with data that does not fit the expected schema
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Requested item does not exist upstream
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied arguments were rejected before contacting the provider
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ProviderError {
    /// Whether a single retry could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Timeout(_) | ProviderError::Transient(_))
    }

    /// Classify an HTTP status from an upstream API.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), body);
        if status == reqwest::StatusCode::NOT_FOUND {
            ProviderError::NotFound(detail)
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            ProviderError::Transient(detail)
        } else {
            ProviderError::Rejected(detail)
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Transient(err.to_string())
        }
    }
}

/// Hard failures of the full verification engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerificationError {
    /// The enrichment dependency failed after its retry
    #[error("verification unavailable: {0}")]
    Unavailable(String),

    /// The enrichment dependency answered with unusable data
    #[error("malformed provider response: {0}")]
    MalformedProviderResponse(String),
}

impl From<ProviderError> for VerificationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Malformed(msg) => VerificationError::MalformedProviderResponse(msg),
            other => VerificationError::Unavailable(other.to_string()),
        }
    }
}

/// Errors returned by HTTP handlers.
///
/// ## Status Mapping:
/// - Internal/ConfigError → 500
/// - BadRequest/InvalidInput/ValidationError → 400
/// - NotFound → 404
/// - UpstreamError → 502
/// - VerificationUnavailable → 503
#[derive(Debug)]
pub enum AppError {
    /// Server-side problems (storage failures, poisoned state, etc.)
    Internal(String),

    /// Request could not be processed as sent (multipart problems, etc.)
    BadRequest(String),

    /// Request body had missing fields or fields of the wrong type
    InvalidInput(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// Input failed a domain validation rule
    ValidationError(String),

    /// Verification could not complete; the learner should retry
    VerificationUnavailable(String),

    /// A collaborator (transcription, verse source) failed
    UpstreamError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::VerificationUnavailable(msg) => write!(f, "Verification unavailable: {}", msg),
            AppError::UpstreamError(msg) => write!(f, "Upstream error: {}", msg),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.as_str()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.as_str()),
            AppError::VerificationUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "verification_unavailable", msg.as_str())
            }
            AppError::UpstreamError(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg.as_str()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.parts();

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        AppError::VerificationUnavailable(err.to_string())
    }
}

/// Collaborator failures surface as client errors when the caller asked for
/// something invalid, and as gateway errors otherwise.
impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidInput(msg) => AppError::ValidationError(msg),
            ProviderError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::UpstreamError(other.to_string()),
        }
    }
}

impl From<crate::attempts::StoreError> for AppError {
    fn from(err: crate::attempts::StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Shorthand for handler results.
pub type AppResult<T> = Result<T, AppError>;
