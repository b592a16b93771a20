//! SQLite database for the recognition history

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

use super::records::{NewOcrRecord, OcrRecord};

/// Errors raised by the history store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Schema migrations, applied in order and tracked in `PRAGMA user_version`
const MIGRATIONS: &[&str] = &[
    // v1: original four-field layout
    "CREATE TABLE IF NOT EXISTS OcrResult (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ocrEngine TEXT NOT NULL,
        recognizedText TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        durationMillis INTEGER NOT NULL CHECK (durationMillis >= 0)
    );",
    // v2: engine footprint annotation
    "ALTER TABLE OcrResult ADD COLUMN engineSize TEXT NOT NULL DEFAULT '';",
    // v3: history is always read newest first
    "CREATE INDEX IF NOT EXISTS idx_ocr_result_timestamp ON OcrResult(timestamp);",
];

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("SQLite journal mode: {}", mode);

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        info!("History database ready at {:?}", path);
        Ok(db)
    }

    /// Open a private in-memory database
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Bring the schema up to the latest version
    pub fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let current: usize = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        for (index, migration) in MIGRATIONS.iter().enumerate().skip(current) {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration)?;
            tx.pragma_update(None, "user_version", (index + 1) as i64)?;
            tx.commit()?;
            debug!("Applied schema migration v{}", index + 1);
        }

        Ok(())
    }

    /// Schema version currently applied
    #[cfg(test)]
    pub(crate) fn schema_version(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Insert a record and return it with its generated id
    pub fn insert(&self, record: &NewOcrRecord) -> Result<OcrRecord, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO OcrResult
                 (ocrEngine, engineSize, recognizedText, timestamp, durationMillis)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.engine,
                record.engine_size,
                record.recognized_text,
                record.timestamp,
                record.duration_millis,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(record.clone().with_id(id))
    }

    /// All records, newest first
    pub fn list_all(&self) -> Result<Vec<OcrRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, ocrEngine, engineSize, recognizedText, timestamp, durationMillis
             FROM OcrResult
             ORDER BY timestamp DESC, id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(OcrRecord {
                id: row.get(0)?,
                engine: row.get(1)?,
                engine_size: row.get(2)?,
                recognized_text: row.get(3)?,
                timestamp: row.get(4)?,
                duration_millis: row.get(5)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of stored records
    #[cfg(test)]
    pub(crate) fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM OcrResult", [], |row| row.get(0))?)
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(engine: &str, text: &str, timestamp: i64) -> NewOcrRecord {
        NewOcrRecord {
            engine: engine.to_string(),
            engine_size: "~22MB".to_string(),
            recognized_text: text.to_string(),
            timestamp,
            duration_millis: 10,
        }
    }

    #[test]
    fn test_insert_assigns_ids() {
        let db = Database::open_in_memory().unwrap();

        let first = db.insert(&record("Tesseract", "one", 1)).unwrap();
        let second = db.insert(&record("Tesseract", "two", 2)).unwrap();

        assert!(second.id > first.id);
        assert_eq!(db.count().unwrap(), 2);
    }

    #[test]
    fn test_list_all_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&record("PaddleOCR", "t2", 2_000)).unwrap();
        db.insert(&record("PaddleOCR", "t1", 1_000)).unwrap();
        db.insert(&record("PaddleOCR", "t3", 3_000)).unwrap();

        let texts: Vec<_> = db
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.recognized_text)
            .collect();
        assert_eq!(texts, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_equal_timestamps_fall_back_to_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&record("PaddleOCR", "older", 5)).unwrap();
        db.insert(&record("PaddleOCR", "newer", 5)).unwrap();

        let rows = db.list_all().unwrap();
        assert_eq!(rows[0].recognized_text, "newer");
        assert!(rows.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_round_trips_all_columns() {
        let db = Database::open_in_memory().unwrap();
        let mut new = record("Tesseract", "line one\nline two", 1_700_000_000_000);
        new.duration_millis = 987;
        let inserted = db.insert(&new).unwrap();

        let rows = db.list_all().unwrap();
        assert_eq!(rows, vec![inserted]);
    }

    #[test]
    fn test_fresh_schema_is_latest() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), MIGRATIONS.len());
    }

    #[test]
    fn test_migrates_four_field_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(MIGRATIONS[0]).unwrap();
            conn.pragma_update(None, "user_version", 1).unwrap();
            conn.execute(
                "INSERT INTO OcrResult (ocrEngine, recognizedText, timestamp, durationMillis)
                 VALUES ('ML Kit', 'legacy', 10, 5)",
                [],
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), MIGRATIONS.len());

        let rows = db.list_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recognized_text, "legacy");
        assert_eq!(rows[0].engine_size, "");
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history").join("ocr_database.db");

        {
            let db = Database::open(&path).unwrap();
            db.insert(&record("Tesseract", "persisted", 1)).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.count().unwrap(), 1);
    }
}
