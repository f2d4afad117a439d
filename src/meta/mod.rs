//! Metadata storage using SQLite
//!
//! This module handles all local metadata storage including:
//! - Documents (one row per ingested input)
//! - Chunks (the text behind each vector point)
//! - Query log (audit trail of questions asked)
//!
//! Chunk rows are only ever written inside the same transaction as their
//! document row, so a chunk can never reference a document that does not
//! exist. A document whose vectors were not fully written stays in the
//! `pending` status and is invisible to retrieval.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Rows written, vectors not yet confirmed in the vector store
    Pending,
    Complete,
    /// Vector write failed; excluded from retrieval until re-ingested
    Incomplete,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Complete => write!(f, "complete"),
            DocumentStatus::Incomplete => write!(f, "incomplete"),
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DocumentStatus::Pending),
            "complete" => Ok(DocumentStatus::Complete),
            "incomplete" => Ok(DocumentStatus::Incomplete),
            _ => Err(Error::Config(format!("Unknown document status: {}", s))),
        }
    }
}

/// An ingested document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub source_url: Option<String>,
    pub content_type: String,
    pub content_hash: String,
    pub status: String,
    pub chunk_count: i64,
    pub extraction_provider: String,
    /// Provider whose vectors back this document; None until embeddings exist
    pub embedding_provider: Option<String>,
    pub warning: Option<String>,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn new(
        filename: String,
        source_url: Option<String>,
        content_type: String,
        content_hash: String,
        extraction_provider: String,
        embedding_provider: Option<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            filename,
            source_url,
            content_type,
            content_hash,
            status: DocumentStatus::Pending.to_string(),
            chunk_count: 0,
            extraction_provider,
            embedding_provider,
            warning: None,
            metadata_json: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn get_status(&self) -> Result<DocumentStatus> {
        self.status.parse()
    }
}

/// A stored chunk row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub chunk_offset: i64,
    pub chunk_text: String,
    pub embedding_dim: i64,
    pub point_id: String,
    pub created_at: String,
}

impl ChunkRow {
    pub fn new(
        document_id: String,
        chunk_index: i64,
        chunk_offset: i64,
        chunk_text: String,
        embedding_dim: i64,
    ) -> Self {
        // Stable point ID per (document, index) so re-writes overwrite
        // rather than duplicate points.
        let point_id = Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("{}:{}", document_id, chunk_index).as_bytes(),
        )
        .to_string();

        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            chunk_index,
            chunk_offset,
            chunk_text,
            embedding_dim,
            point_id,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// One logged query
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub filter_json: Option<String>,
    /// JSON array of `{chunk_id, score}` for the chunks behind the answer
    pub sources_json: Option<String>,
    pub top_k: i64,
    pub result_count: i64,
    pub answer_provider: Option<String>,
    pub model: Option<String>,
    pub duration_ms: i64,
    pub created_at: String,
}

impl QueryLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        question: String,
        answer: String,
        filter_json: Option<String>,
        sources_json: Option<String>,
        top_k: i64,
        result_count: i64,
        answer_provider: Option<String>,
        model: Option<String>,
        duration_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question,
            answer,
            filter_json,
            sources_json,
            top_k,
            result_count,
            answer_provider,
            model,
            duration_ms,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub query_count: usize,
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Connect with a path directly (without full config)
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='documents'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Document Operations =====

    /// Insert a document and its chunks in one transaction.
    ///
    /// The document row lands before any chunk row; a failure anywhere
    /// rolls back everything.
    pub async fn insert_document_with_chunks(
        &self,
        doc: &Document,
        chunks: &[ChunkRow],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, source_url, content_type, content_hash, status, chunk_count, extraction_provider, embedding_provider, warning, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.source_url)
        .bind(&doc.content_type)
        .bind(&doc.content_hash)
        .bind(&doc.status)
        .bind(chunks.len() as i64)
        .bind(&doc.extraction_provider)
        .bind(&doc.embedding_provider)
        .bind(&doc.warning)
        .bind(&doc.metadata_json)
        .bind(&doc.created_at)
        .bind(&doc.updated_at)
        .execute(&mut *tx)
        .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, chunk_offset, chunk_text, embedding_dim, point_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(chunk.chunk_offset)
            .bind(&chunk.chunk_text)
            .bind(chunk.embedding_dim)
            .bind(&chunk.point_id)
            .bind(&chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Move a document to a new lifecycle status
    pub async fn set_document_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get document by ID
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// Get document by content hash (idempotent re-ingest check)
    pub async fn get_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE content_hash = ?")
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// All documents carrying a filename, newest first
    pub async fn get_documents_by_filename(&self, filename: &str) -> Result<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE filename = ? ORDER BY created_at DESC",
        )
        .bind(filename)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    /// List all documents, newest first
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let docs =
            sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(docs)
    }

    /// Delete a document and its chunks, returning the vector point IDs
    /// that must be removed from the vector store.
    pub async fn delete_document(&self, id: &str) -> Result<Vec<String>> {
        let point_ids: Vec<String> =
            sqlx::query_scalar("SELECT point_id FROM chunks WHERE document_id = ?")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(point_ids)
    }

    // ===== Chunk Operations =====

    /// Get chunks for a document, in index order
    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRow>> {
        let chunks = sqlx::query_as::<_, ChunkRow>(
            "SELECT * FROM chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Resolve search hits back to chunk text.
    ///
    /// Only chunks of `complete` documents are returned; a pending or
    /// incomplete document's points never reach an answer.
    pub async fn get_chunks_by_point_ids(&self, point_ids: &[String]) -> Result<Vec<ChunkRow>> {
        if point_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = point_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            r#"
            SELECT c.* FROM chunks c
            JOIN documents d ON c.document_id = d.id
            WHERE d.status = 'complete' AND c.point_id IN ({})
            "#,
            placeholders
        );

        let mut query_builder = sqlx::query_as::<_, ChunkRow>(&query);
        for point_id in point_ids {
            query_builder = query_builder.bind(point_id);
        }
        let chunks = query_builder.fetch_all(&self.pool).await?;
        Ok(chunks)
    }

    // ===== Query Log =====

    /// Append a query log entry
    pub async fn insert_query_log(&self, entry: &QueryLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO query_log (id, question, answer, filter_json, sources_json, top_k, result_count, answer_provider, model, duration_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.question)
        .bind(&entry.answer)
        .bind(&entry.filter_json)
        .bind(&entry.sources_json)
        .bind(entry.top_k)
        .bind(entry.result_count)
        .bind(&entry.answer_provider)
        .bind(&entry.model)
        .bind(entry.duration_ms)
        .bind(&entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent query log entries
    pub async fn recent_queries(&self, limit: i64) -> Result<Vec<QueryLogEntry>> {
        let entries = sqlx::query_as::<_, QueryLogEntry>(
            "SELECT * FROM query_log ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let doc_count: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        let chunk_count: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        let query_count: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM query_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            document_count: doc_count as usize,
            chunk_count: chunk_count as usize,
            query_count: query_count as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    fn test_document(filename: &str, hash: &str) -> Document {
        Document::new(
            filename.to_string(),
            None,
            "application/pdf".to_string(),
            hash.to_string(),
            "paddleocr".to_string(),
            Some("local-embed".to_string()),
        )
    }

    fn test_chunks(doc_id: &str, count: usize) -> Vec<ChunkRow> {
        (0..count)
            .map(|i| {
                ChunkRow::new(
                    doc_id.to_string(),
                    i as i64,
                    (i * 800) as i64,
                    format!("chunk {} text", i),
                    384,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_document_and_chunks_are_transactional() {
        let (db, _tmp) = setup_test_db().await;

        let doc = test_document("report.pdf", "hash1");
        let chunks = test_chunks(&doc.id, 3);
        db.insert_document_with_chunks(&doc, &chunks).await.unwrap();

        let loaded = db.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.chunk_count, 3);
        assert_eq!(loaded.get_status().unwrap(), DocumentStatus::Pending);

        let stored = db.get_chunks(&doc.id).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].chunk_index, 0);
        assert_eq!(stored[2].chunk_offset, 1600);
    }

    #[tokio::test]
    async fn test_duplicate_content_hash_is_detected() {
        let (db, _tmp) = setup_test_db().await;

        let doc = test_document("report.pdf", "same-hash");
        db.insert_document_with_chunks(&doc, &test_chunks(&doc.id, 1))
            .await
            .unwrap();

        let existing = db.get_document_by_hash("same-hash").await.unwrap();
        assert!(existing.is_some());
        assert_eq!(existing.unwrap().filename, "report.pdf");

        assert!(db.get_document_by_hash("other-hash").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_transition() {
        let (db, _tmp) = setup_test_db().await;

        let doc = test_document("a.pdf", "h1");
        db.insert_document_with_chunks(&doc, &test_chunks(&doc.id, 1))
            .await
            .unwrap();

        db.set_document_status(&doc.id, DocumentStatus::Complete)
            .await
            .unwrap();
        let loaded = db.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.get_status().unwrap(), DocumentStatus::Complete);
    }

    #[tokio::test]
    async fn test_point_lookup_skips_incomplete_documents() {
        let (db, _tmp) = setup_test_db().await;

        let good = test_document("good.pdf", "h-good");
        let good_chunks = test_chunks(&good.id, 1);
        db.insert_document_with_chunks(&good, &good_chunks)
            .await
            .unwrap();
        db.set_document_status(&good.id, DocumentStatus::Complete)
            .await
            .unwrap();

        let bad = test_document("bad.pdf", "h-bad");
        let bad_chunks = test_chunks(&bad.id, 1);
        db.insert_document_with_chunks(&bad, &bad_chunks)
            .await
            .unwrap();

        let point_ids = vec![
            good_chunks[0].point_id.clone(),
            bad_chunks[0].point_id.clone(),
        ];
        let found = db.get_chunks_by_point_ids(&point_ids).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].document_id, good.id);
    }

    #[tokio::test]
    async fn test_delete_returns_point_ids() {
        let (db, _tmp) = setup_test_db().await;

        let doc = test_document("gone.pdf", "h2");
        let chunks = test_chunks(&doc.id, 2);
        db.insert_document_with_chunks(&doc, &chunks).await.unwrap();

        let point_ids = db.delete_document(&doc.id).await.unwrap();
        assert_eq!(point_ids.len(), 2);
        assert!(db.get_document(&doc.id).await.unwrap().is_none());
        assert!(db.get_chunks(&doc.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_documents_by_filename() {
        let (db, _tmp) = setup_test_db().await;

        let first = test_document("shared.pdf", "h-a");
        let second = test_document("shared.pdf", "h-b");
        db.insert_document_with_chunks(&first, &[]).await.unwrap();
        db.insert_document_with_chunks(&second, &[]).await.unwrap();

        let docs = db.get_documents_by_filename("shared.pdf").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(db
            .get_documents_by_filename("other.pdf")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_query_log_round_trip() {
        let (db, _tmp) = setup_test_db().await;

        let entry = QueryLogEntry::new(
            "what is the warranty?".to_string(),
            "Two years [1].".to_string(),
            Some(r#"{"filename":"warranty.pdf"}"#.to_string()),
            Some(r#"[{"chunk_id":"c1","score":0.82}]"#.to_string()),
            5,
            3,
            Some("ollama".to_string()),
            Some("llama3.1".to_string()),
            412,
        );
        db.insert_query_log(&entry).await.unwrap();

        let recent = db.recent_queries(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].question, "what is the warranty?");
        assert_eq!(recent[0].answer, "Two years [1].");
        assert_eq!(recent[0].result_count, 3);
        assert_eq!(recent[0].model.as_deref(), Some("llama3.1"));
        assert!(recent[0].sources_json.as_deref().unwrap().contains("0.82"));

        let stats = db.get_global_stats().await.unwrap();
        assert_eq!(stats.query_count, 1);
    }

    #[test]
    fn test_point_ids_are_stable_per_document_and_index() {
        let a = ChunkRow::new("doc-1".to_string(), 0, 0, "x".to_string(), 384);
        let b = ChunkRow::new("doc-1".to_string(), 0, 0, "y".to_string(), 384);
        let c = ChunkRow::new("doc-2".to_string(), 0, 0, "x".to_string(), 384);

        assert_eq!(a.point_id, b.point_id);
        assert_ne!(a.point_id, c.point_id);
    }
}
