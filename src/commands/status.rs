//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::MetaDb;
use crate::store::QdrantStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One document line in the status listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub status: String,
    pub chunk_count: i64,
    pub embedding_provider: Option<String>,
    pub warning: Option<String>,
    pub created_at: String,
}

/// System status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub document_count: usize,
    pub chunk_count: usize,
    pub query_count: usize,
    pub qdrant_reachable: bool,
    pub qdrant_points: Option<u64>,
    pub documents: Vec<DocumentSummary>,
}

/// Gather document, chunk and vector store statistics.
///
/// Qdrant being down degrades the report instead of failing it.
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusReport> {
    let stats = db.get_global_stats().await?;

    let documents = db
        .list_documents()
        .await?
        .into_iter()
        .map(|d| DocumentSummary {
            id: d.id,
            filename: d.filename,
            status: d.status,
            chunk_count: d.chunk_count,
            embedding_provider: d.embedding_provider,
            warning: d.warning,
            created_at: d.created_at,
        })
        .collect();

    let (qdrant_reachable, qdrant_points) = match QdrantStore::connect(config, 0).await {
        Ok(store) => match store.get_collection_info().await {
            Ok(Some(info)) => (true, Some(info.points_count)),
            Ok(None) => (true, None),
            Err(e) => {
                debug!("Qdrant status check failed: {}", e);
                (false, None)
            }
        },
        Err(e) => {
            debug!("Qdrant connection failed: {}", e);
            (false, None)
        }
    };

    Ok(StatusReport {
        document_count: stats.document_count,
        chunk_count: stats.chunk_count,
        query_count: stats.query_count,
        qdrant_reachable,
        qdrant_points,
        documents,
    })
}

/// Human-readable status output
pub fn print_status(report: &StatusReport) {
    println!("docquery status");
    println!("  Documents: {}", report.document_count);
    println!("  Chunks: {}", report.chunk_count);
    println!("  Queries logged: {}", report.query_count);

    match (report.qdrant_reachable, report.qdrant_points) {
        (true, Some(points)) => println!("  Qdrant: reachable ({} points)", points),
        (true, None) => println!("  Qdrant: reachable (no collection yet)"),
        (false, _) => println!("  Qdrant: unreachable"),
    }

    if !report.documents.is_empty() {
        println!("\nDocuments:");
        for doc in &report.documents {
            let warning = doc
                .warning
                .as_deref()
                .map(|w| format!(" ⚠ {}", w))
                .unwrap_or_default();
            println!(
                "  {}  {}  [{}] {} chunks ({}){}",
                doc.id,
                doc.filename,
                doc.status,
                doc.chunk_count,
                doc.embedding_provider.as_deref().unwrap_or("no embeddings"),
                warning
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ChunkRow, Document};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_counts_documents_and_chunks() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let db = MetaDb::connect(&config).await.unwrap();

        let doc = Document::new(
            "a.pdf".to_string(),
            None,
            "application/pdf".to_string(),
            "h1".to_string(),
            "paddleocr".to_string(),
            Some("local-embed".to_string()),
        );
        let chunks = vec![ChunkRow::new(doc.id.clone(), 0, 0, "text".to_string(), 384)];
        db.insert_document_with_chunks(&doc, &chunks).await.unwrap();

        let report = cmd_status(&config, &db).await.unwrap();

        assert_eq!(report.document_count, 1);
        assert_eq!(report.chunk_count, 1);
        assert_eq!(report.documents[0].filename, "a.pdf");
    }
}
