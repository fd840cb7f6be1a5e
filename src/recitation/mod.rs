//! Recitation verification core: normalization, scoring and alignment.

pub mod alignment;
pub mod engine;
pub mod enrichment;
pub mod normalize;
pub mod similarity;
pub mod types;

pub use engine::{
    score_recitation, EnrichmentOutcome, FailurePolicy, RecitationVerifier, Verification, VerificationSettings,
};
pub use enrichment::{Enrichment, EnrichmentRequest, LocalFeedbackEnricher, NoopEnricher, RecitationEnricher};
pub use similarity::{quick_verify, QuickScore};
pub use types::{VerificationContext, VerificationResult};
