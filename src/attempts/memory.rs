//! In-memory attempt store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AttemptPage, AttemptQuery, AttemptRecord, AttemptStore, AttemptSummary, NewAttempt, StoreError};

/// Keeps attempts newest first in a vector.
#[derive(Default)]
pub struct MemoryAttemptStore {
    attempts: RwLock<Vec<AttemptRecord>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn insert(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError> {
        let record = attempt.into_record(Uuid::new_v4(), Utc::now());
        self.attempts.write().await.insert(0, record.clone());
        Ok(record)
    }

    async fn list(&self, query: AttemptQuery) -> Result<AttemptPage, StoreError> {
        let attempts = self.attempts.read().await;
        let matching: Vec<&AttemptRecord> = attempts
            .iter()
            .filter(|a| query.surah.map_or(true, |s| a.surah_number == s))
            .collect();

        Ok(AttemptPage {
            total: matching.len(),
            attempts: matching
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .cloned()
                .collect(),
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<AttemptRecord>, StoreError> {
        Ok(self.attempts.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut attempts = self.attempts.write().await;
        let before = attempts.len();
        attempts.retain(|a| a.id != id);
        Ok(attempts.len() != before)
    }

    async fn all_for_stats(&self) -> Result<Vec<AttemptSummary>, StoreError> {
        Ok(self.attempts.read().await.iter().map(AttemptSummary::from).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempts::test_support::exercise_store;

    #[tokio::test]
    async fn test_memory_store_behavior() {
        let store = MemoryAttemptStore::new();
        exercise_store(&store).await;
    }
}
