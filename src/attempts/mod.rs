//! # Attempt History
//!
//! Practice attempts are persisted through the [`AttemptStore`] trait. The
//! store is built once at startup from `storage.backend` and shared through
//! `AppState`; handlers never reach for a global.
//!
//! ## Implementations:
//! - **MemoryAttemptStore**: lost on restart, used in tests and development
//! - **SqliteAttemptStore**: rusqlite with WAL, word results stored as JSON

pub mod memory;
pub mod sqlite;
pub mod stats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recitation::types::{ErrorEntry, ExtraWord, WordResult};

pub use memory::MemoryAttemptStore;
pub use sqlite::SqliteAttemptStore;
pub use stats::{compute_stats, PracticeStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Passed,
    NeedsReview,
}

impl AttemptStatus {
    pub fn from_accuracy(accuracy: u8, pass_threshold: u8) -> Self {
        if accuracy >= pass_threshold {
            AttemptStatus::Passed
        } else {
            AttemptStatus::NeedsReview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Passed => "passed",
            AttemptStatus::NeedsReview => "needs_review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "passed" => Some(AttemptStatus::Passed),
            "needs_review" => Some(AttemptStatus::NeedsReview),
            _ => None,
        }
    }
}

/// A stored practice attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub surah_number: u16,
    pub surah_name: Option<String>,
    pub verse_start: u16,
    pub verse_end: u16,
    pub transcription: String,
    pub original_text: String,
    pub accuracy: u8,
    pub word_results: Vec<WordResult>,
    /// Recited words with no counterpart in the reference
    #[serde(default)]
    pub extra_words: Vec<ExtraWord>,
    pub errors: Vec<ErrorEntry>,
    pub duration_seconds: Option<f64>,
    pub status: AttemptStatus,
}

/// An attempt before the store has assigned it an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub surah_number: u16,
    pub surah_name: Option<String>,
    pub verse_start: u16,
    pub verse_end: u16,
    pub transcription: String,
    pub original_text: String,
    pub accuracy: u8,
    pub word_results: Vec<WordResult>,
    pub extra_words: Vec<ExtraWord>,
    pub errors: Vec<ErrorEntry>,
    pub duration_seconds: Option<f64>,
    pub status: AttemptStatus,
}

impl NewAttempt {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> AttemptRecord {
        AttemptRecord {
            id,
            created_at,
            surah_number: self.surah_number,
            surah_name: self.surah_name,
            verse_start: self.verse_start,
            verse_end: self.verse_end,
            transcription: self.transcription,
            original_text: self.original_text,
            accuracy: self.accuracy,
            word_results: self.word_results,
            extra_words: self.extra_words,
            errors: self.errors,
            duration_seconds: self.duration_seconds,
            status: self.status,
        }
    }
}

/// Paging and filtering for [`AttemptStore::list`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptQuery {
    pub surah: Option<u16>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for AttemptQuery {
    fn default() -> Self {
        Self {
            surah: None,
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptPage {
    pub attempts: Vec<AttemptRecord>,
    /// Number of attempts matching the filter, ignoring paging
    pub total: usize,
}

/// The columns statistics are computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    pub accuracy: u8,
    pub status: AttemptStatus,
    pub surah_number: u16,
    pub created_at: DateTime<Utc>,
}

impl From<&AttemptRecord> for AttemptSummary {
    fn from(record: &AttemptRecord) -> Self {
        Self {
            accuracy: record.accuracy,
            status: record.status,
            surah_number: record.surah_number,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored attempt is corrupt: {0}")]
    Corrupt(String),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Persistence for practice attempts.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn insert(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError>;

    /// Newest first
    async fn list(&self, query: AttemptQuery) -> Result<AttemptPage, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<AttemptRecord>, StoreError>;

    /// Returns whether an attempt was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn all_for_stats(&self) -> Result<Vec<AttemptSummary>, StoreError>;

    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn new_attempt(surah: u16, accuracy: u8) -> NewAttempt {
        NewAttempt {
            surah_number: surah,
            surah_name: Some("Al-Ikhlas".to_string()),
            verse_start: 1,
            verse_end: 4,
            transcription: "قل هو الله احد".to_string(),
            original_text: "قُلْ هُوَ ٱللَّهُ أَحَدٌ".to_string(),
            accuracy,
            word_results: vec![],
            extra_words: vec![],
            errors: vec![],
            duration_seconds: Some(3.5),
            status: AttemptStatus::from_accuracy(accuracy, 85),
        }
    }

    /// Behavior every store must share.
    pub async fn exercise_store(store: &dyn AttemptStore) {
        let first = store.insert(new_attempt(112, 100)).await.unwrap();
        let second = store.insert(new_attempt(1, 40)).await.unwrap();
        let third = store.insert(new_attempt(112, 90)).await.unwrap();

        let page = store.list(AttemptQuery::default()).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<Uuid> = page.attempts.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let page = store
            .list(AttemptQuery {
                surah: Some(112),
                ..AttemptQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.attempts.iter().all(|a| a.surah_number == 112));

        let page = store
            .list(AttemptQuery {
                surah: None,
                limit: 1,
                offset: 1,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.attempts.len(), 1);
        assert_eq!(page.attempts[0].id, second.id);

        let page = store
            .list(AttemptQuery {
                surah: None,
                limit: 5,
                offset: usize::MAX,
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.attempts.is_empty());

        let fetched = store.get(second.id).await.unwrap().unwrap();
        assert_eq!(fetched, second);
        assert_eq!(fetched.status, AttemptStatus::NeedsReview);

        assert!(store.delete(second.id).await.unwrap());
        assert!(!store.delete(second.id).await.unwrap());
        assert!(store.get(second.id).await.unwrap().is_none());

        let summaries = store.all_for_stats().await.unwrap();
        assert_eq!(summaries.len(), 2);
    }
}
