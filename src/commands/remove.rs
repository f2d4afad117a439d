//! Remove command implementation
//!
//! Deletion runs vector store first, then chunk rows, then the document
//! row: an interruption can leave a document without vectors (harmless,
//! it just stops matching) but never vectors without their document.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::store::QdrantStore;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Outcome of a document removal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveReport {
    pub document_id: String,
    pub filename: String,
    pub chunks_removed: usize,
    pub points_removed: usize,
}

/// Remove a document, its chunks and its vectors
pub async fn cmd_remove(
    config: &Config,
    db: &MetaDb,
    document_id: &str,
) -> Result<RemoveReport> {
    let doc = db
        .get_document(document_id)
        .await?
        .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;

    let chunks = db.get_chunks(document_id).await?;
    let point_ids: Vec<Uuid> = chunks
        .iter()
        .map(|c| {
            Uuid::parse_str(&c.point_id)
                .map_err(|e| Error::Integrity(format!("Bad point id {}: {}", c.point_id, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    if !point_ids.is_empty() {
        let dimension = chunks
            .first()
            .map(|c| c.embedding_dim as usize)
            .unwrap_or(0);
        let store = QdrantStore::connect(config, dimension).await?;
        if store.collection_exists().await? {
            store.delete_points(&point_ids).await?;
        }
    }

    let removed = db.delete_document(document_id).await?;

    info!(
        document_id,
        filename = %doc.filename,
        chunks = removed.len(),
        "Document removed"
    );

    Ok(RemoveReport {
        document_id: document_id.to_string(),
        filename: doc.filename,
        chunks_removed: removed.len(),
        points_removed: point_ids.len(),
    })
}

/// Human-readable removal summary
pub fn print_remove_report(report: &RemoveReport) {
    println!(
        "✓ Removed '{}' ({} chunks, {} vectors)",
        report.filename, report.chunks_removed, report.points_removed
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_unknown_document_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let db = MetaDb::connect(&config).await.unwrap();

        let err = cmd_remove(&config, &db, "missing-id").await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }
}
