//! Async access to the history database
//!
//! SQLite calls block, so every operation is moved onto the blocking pool.

use std::sync::Arc;
use tracing::info;

use super::database::{Database, StoreError};
use super::records::{NewOcrRecord, OcrRecord};

/// Cloneable handle to the recognition history
#[derive(Clone)]
pub struct HistoryStore {
    db: Arc<Database>,
}

impl HistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Append one record. Completes only once the row is written.
    pub async fn insert(&self, record: NewOcrRecord) -> Result<OcrRecord, StoreError> {
        let db = Arc::clone(&self.db);
        let stored = tokio::task::spawn_blocking(move || db.insert(&record)).await??;
        info!(
            "Saved result #{} ({}, {} ms)",
            stored.id, stored.engine, stored.duration_millis
        );
        Ok(stored)
    }

    /// Every record, newest first
    pub async fn list_all(&self) -> Result<Vec<OcrRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.list_all()).await?
    }

    /// Number of stored records
    #[cfg(test)]
    pub(crate) async fn count(&self) -> Result<usize, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.count()).await?
    }

    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HistoryStore {
        HistoryStore::new(Database::open_in_memory().unwrap())
    }

    fn record(text: &str, timestamp: i64) -> NewOcrRecord {
        NewOcrRecord {
            engine: "PaddleOCR".to_string(),
            engine_size: "~10MB".to_string(),
            recognized_text: text.to_string(),
            timestamp,
            duration_millis: 1,
        }
    }

    #[tokio::test]
    async fn test_history_returns_newest_first() {
        let store = store();
        store.insert(record("t1", 100)).await.unwrap();
        store.insert(record("t2", 200)).await.unwrap();
        store.insert(record("t3", 300)).await.unwrap();

        let timestamps: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(timestamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_clones_share_the_database() {
        let store = store();
        let other = store.clone();

        store.insert(record("shared", 1)).await.unwrap();
        assert_eq!(other.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_failure_is_reported() {
        let store = store();
        store.database().execute_raw("DROP TABLE OcrResult;").unwrap();

        let result = store.insert(record("lost", 1)).await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }
}
