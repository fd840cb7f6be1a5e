//! SQLite-backed attempt store.
//!
//! One table, one row per attempt. Word results, extra words and errors are
//! kept as JSON text since they are only ever read back whole. All queries run on the
//! blocking pool behind a mutex around the single connection.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use super::{
    AttemptPage, AttemptQuery, AttemptRecord, AttemptStatus, AttemptStore, AttemptSummary, NewAttempt, StoreError,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS hifz_attempts (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    surah_number INTEGER NOT NULL,
    surah_name TEXT,
    verse_start INTEGER NOT NULL,
    verse_end INTEGER NOT NULL,
    transcription TEXT NOT NULL,
    original_text TEXT NOT NULL,
    accuracy INTEGER NOT NULL,
    word_results TEXT NOT NULL,
    errors TEXT NOT NULL,
    duration_seconds REAL,
    status TEXT NOT NULL,
    extra_words TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_hifz_attempts_created ON hifz_attempts (created_at DESC);
CREATE INDEX IF NOT EXISTS idx_hifz_attempts_surah ON hifz_attempts (surah_number);";

const RECORD_COLUMNS: &str = "id, created_at, surah_number, surah_name, verse_start, verse_end, \
     transcription, original_text, accuracy, word_results, errors, duration_seconds, status, extra_words";

/// Columns as stored, before the text ones are parsed.
struct RawAttempt {
    id: String,
    created_at: String,
    surah_number: u16,
    surah_name: Option<String>,
    verse_start: u16,
    verse_end: u16,
    transcription: String,
    original_text: String,
    accuracy: u8,
    word_results: String,
    errors: String,
    duration_seconds: Option<f64>,
    status: String,
    extra_words: String,
}

impl RawAttempt {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            surah_number: row.get(2)?,
            surah_name: row.get(3)?,
            verse_start: row.get(4)?,
            verse_end: row.get(5)?,
            transcription: row.get(6)?,
            original_text: row.get(7)?,
            accuracy: row.get(8)?,
            word_results: row.get(9)?,
            errors: row.get(10)?,
            duration_seconds: row.get(11)?,
            status: row.get(12)?,
            extra_words: row.get(13)?,
        })
    }

    fn into_record(self) -> Result<AttemptRecord, StoreError> {
        Ok(AttemptRecord {
            id: parse_id(&self.id)?,
            created_at: parse_timestamp(&self.created_at)?,
            surah_number: self.surah_number,
            surah_name: self.surah_name,
            verse_start: self.verse_start,
            verse_end: self.verse_end,
            transcription: self.transcription,
            original_text: self.original_text,
            accuracy: self.accuracy,
            word_results: serde_json::from_str(&self.word_results)
                .map_err(|e| StoreError::Corrupt(format!("word_results of {}: {}", self.id, e)))?,
            extra_words: serde_json::from_str(&self.extra_words)
                .map_err(|e| StoreError::Corrupt(format!("extra_words of {}: {}", self.id, e)))?,
            errors: serde_json::from_str(&self.errors)
                .map_err(|e| StoreError::Corrupt(format!("errors of {}: {}", self.id, e)))?,
            duration_seconds: self.duration_seconds,
            status: parse_status(&self.status)?,
        })
    }
}

fn parse_id(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("id {}: {}", value, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("created_at {}: {}", value, e)))
}

fn parse_status(value: &str) -> Result<AttemptStatus, StoreError> {
    AttemptStatus::parse(value).ok_or_else(|| StoreError::Corrupt(format!("status {}", value)))
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Databases created before `extra_words` existed get the column added.
fn add_missing_columns(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('hifz_attempts')")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if !columns.iter().any(|c| c == "extra_words") {
        conn.execute_batch("ALTER TABLE hifz_attempts ADD COLUMN extra_words TEXT NOT NULL DEFAULT '[]'")?;
        info!("Added extra_words column to hifz_attempts");
    }
    Ok(())
}

pub struct SqliteAttemptStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAttemptStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "Attempt store initialized");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL lets readers proceed while a write is in progress
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        add_missing_columns(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Task("connection mutex poisoned".to_string()))?;
            f(&*conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl AttemptStore for SqliteAttemptStore {
    async fn insert(&self, attempt: NewAttempt) -> Result<AttemptRecord, StoreError> {
        // Stored timestamps carry microseconds, so the returned record does too.
        let record = attempt.into_record(Uuid::new_v4(), Utc::now().trunc_subsecs(6));
        let word_results = serde_json::to_string(&record.word_results)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let extra_words = serde_json::to_string(&record.extra_words)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let errors = serde_json::to_string(&record.errors).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO hifz_attempts (id, created_at, surah_number, surah_name, verse_start, verse_end,
                     transcription, original_text, accuracy, word_results, errors, duration_seconds, status,
                     extra_words)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    row.id.to_string(),
                    format_timestamp(&row.created_at),
                    row.surah_number,
                    row.surah_name,
                    row.verse_start,
                    row.verse_end,
                    row.transcription,
                    row.original_text,
                    row.accuracy,
                    word_results,
                    errors,
                    row.duration_seconds,
                    row.status.as_str(),
                    extra_words,
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(record)
    }

    async fn list(&self, query: AttemptQuery) -> Result<AttemptPage, StoreError> {
        // SQLite reads a negative OFFSET as 0, so out-of-range values saturate instead of wrapping.
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM hifz_attempts WHERE (?1 IS NULL OR surah_number = ?1)",
                params![query.surah],
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {} FROM hifz_attempts WHERE (?1 IS NULL OR surah_number = ?1)
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                RECORD_COLUMNS
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let raw = stmt
                .query_map(
                    params![query.surah, limit, offset],
                    RawAttempt::from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let attempts = raw
                .into_iter()
                .map(RawAttempt::into_record)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(AttemptPage {
                attempts,
                total: total as usize,
            })
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<AttemptRecord>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM hifz_attempts WHERE id = ?1", RECORD_COLUMNS);
            let mut stmt = conn.prepare_cached(&sql)?;
            match stmt.query_row([id.to_string()], RawAttempt::from_row) {
                Ok(raw) => raw.into_record().map(Some),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM hifz_attempts WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn all_for_stats(&self) -> Result<Vec<AttemptSummary>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT accuracy, status, surah_number, created_at FROM hifz_attempts
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, u8>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(accuracy, status, surah_number, created_at)| {
                    Ok(AttemptSummary {
                        accuracy,
                        status: parse_status(&status)?,
                        surah_number,
                        created_at: parse_timestamp(&created_at)?,
                    })
                })
                .collect()
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
