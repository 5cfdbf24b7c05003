//! SQLite-backed storage for analysis results.

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS analysis_results (
    document_id TEXT PRIMARY KEY,
    document_name TEXT,
    upload_time TEXT NOT NULL,
    status TEXT NOT NULL,
    score REAL NOT NULL,
    file_type TEXT NOT NULL DEFAULT '',
    file_url TEXT NOT NULL DEFAULT '',
    suggestions TEXT NOT NULL DEFAULT '[]',
    conflicts TEXT NOT NULL DEFAULT '[]',
    guidelines TEXT NOT NULL DEFAULT '[]',
    summary TEXT NOT NULL DEFAULT ''
)
"#;

// ============================================================================
// AnalysisRecord
// ============================================================================

/// One stored analysis result. List fields are kept as JSON text in the
/// table and materialized on read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub document_id: String,
    pub document_name: Option<String>,
    /// RFC 3339 creation timestamp.
    pub upload_time: String,
    pub status: String,
    pub score: f64,
    pub file_type: String,
    pub file_url: String,
    pub suggestions: Vec<String>,
    pub conflicts: Vec<String>,
    pub guidelines: Vec<String>,
    pub summary: String,
}

impl AnalysisRecord {
    /// Timestamp value for a record created now.
    pub fn now_timestamp() -> String {
        Utc::now().to_rfc3339()
    }
}

// ============================================================================
// ResultStore
// ============================================================================

/// Handle to the analysis results table.
#[derive(Clone)]
pub struct ResultStore {
    pool: SqlitePool,
}

impl ResultStore {
    /// Open (creating if missing) the database at the given path and ensure
    /// the schema exists.
    pub async fn connect(path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        info!(path = %path.display(), "result store initialized");
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // A single connection keeps every query on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or overwrite the record keyed by its document id.
    pub async fn upsert(&self, record: &AnalysisRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO analysis_results
            (document_id, document_name, upload_time, status, score, file_type,
             file_url, suggestions, conflicts, guidelines, summary)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.document_id)
        .bind(&record.document_name)
        .bind(&record.upload_time)
        .bind(&record.status)
        .bind(record.score)
        .bind(&record.file_type)
        .bind(&record.file_url)
        .bind(encode_list(&record.suggestions))
        .bind(encode_list(&record.conflicts))
        .bind(encode_list(&record.guidelines))
        .bind(&record.summary)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch one record by document id.
    pub async fn get(&self, document_id: &str) -> Result<Option<AnalysisRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM analysis_results WHERE document_id = ?1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| record_from_row(&row)))
    }

    /// All records, newest first.
    pub async fn list_all(&self) -> Result<Vec<AnalysisRecord>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM analysis_results ORDER BY upload_time DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Delete one record. Returns whether a row was removed.
    pub async fn delete(&self, document_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM analysis_results WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop and recreate the table.
    pub async fn reset(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS analysis_results")
            .execute(&self.pool)
            .await?;
        self.init().await?;
        info!("result store reset");
        Ok(())
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> AnalysisRecord {
    AnalysisRecord {
        document_id: row.get("document_id"),
        document_name: row.get("document_name"),
        upload_time: row.get("upload_time"),
        status: row.get("status"),
        score: row.get("score"),
        file_type: row.get("file_type"),
        file_url: row.get("file_url"),
        suggestions: decode_list(row.get("suggestions")),
        conflicts: decode_list(row.get("conflicts")),
        guidelines: decode_list(row.get("guidelines")),
        summary: row.get("summary"),
    }
}

fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn decode_list(text: String) -> Vec<String> {
    serde_json::from_str(&text).unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, time: &str, score: f64) -> AnalysisRecord {
        AnalysisRecord {
            document_id: id.to_string(),
            document_name: Some("ad campaign".to_string()),
            upload_time: time.to_string(),
            status: "Approved".to_string(),
            score,
            file_type: "video".to_string(),
            file_url: "static/ad.mp4".to_string(),
            suggestions: vec!["Add a transcript".to_string()],
            conflicts: vec![],
            guidelines: vec!["Use simple, clear language.".to_string()],
            summary: "A 30-second ad".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = ResultStore::connect_in_memory().await.unwrap();

        let original = record("doc-1", "2025-01-01T00:00:00+00:00", 85.0);
        store.upsert(&original).await.unwrap();

        let loaded = store.get("doc-1").await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = ResultStore::connect_in_memory().await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites() {
        let store = ResultStore::connect_in_memory().await.unwrap();

        store
            .upsert(&record("doc-1", "2025-01-01T00:00:00+00:00", 40.0))
            .await
            .unwrap();
        store
            .upsert(&record("doc-1", "2025-01-02T00:00:00+00:00", 90.0))
            .await
            .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].score, 90.0);
    }

    #[tokio::test]
    async fn list_all_orders_newest_first() {
        let store = ResultStore::connect_in_memory().await.unwrap();

        store
            .upsert(&record("older", "2025-01-01T00:00:00+00:00", 50.0))
            .await
            .unwrap();
        store
            .upsert(&record("newer", "2025-06-01T00:00:00+00:00", 60.0))
            .await
            .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].document_id, "newer");
        assert_eq!(all[1].document_id, "older");
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let store = ResultStore::connect_in_memory().await.unwrap();

        store
            .upsert(&record("doc-1", "2025-01-01T00:00:00+00:00", 50.0))
            .await
            .unwrap();

        assert!(store.delete("doc-1").await.unwrap());
        assert!(!store.delete("doc-1").await.unwrap());
        assert!(store.get("doc-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_empties_the_store() {
        let store = ResultStore::connect_in_memory().await.unwrap();

        store
            .upsert(&record("doc-1", "2025-01-01T00:00:00+00:00", 50.0))
            .await
            .unwrap();
        store
            .upsert(&record("doc-2", "2025-01-02T00:00:00+00:00", 60.0))
            .await
            .unwrap();

        store.reset().await.unwrap();

        assert!(store.list_all().await.unwrap().is_empty());

        // Still usable after reset.
        store
            .upsert(&record("doc-3", "2025-01-03T00:00:00+00:00", 70.0))
            .await
            .unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_columns_roundtrip_empty_lists() {
        let store = ResultStore::connect_in_memory().await.unwrap();

        let mut original = record("doc-1", "2025-01-01T00:00:00+00:00", 50.0);
        original.suggestions = vec![];
        original.guidelines = vec![];
        store.upsert(&original).await.unwrap();

        let loaded = store.get("doc-1").await.unwrap().unwrap();
        assert!(loaded.suggestions.is_empty());
        assert!(loaded.guidelines.is_empty());
    }
}
