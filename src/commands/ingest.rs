//! Ingest command implementation
//!
//! The full pipeline for one document: hash, extract, chunk, embed,
//! persist. Metadata rows land in one transaction before any vector is
//! written; the vector upsert then flips the document to `complete`. A
//! document whose vectors fail to write stays out of retrieval.

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embed::embed_chunks;
use crate::error::{Error, Result};
use crate::extract::{extract_text, DocumentSource, Extraction};
use crate::meta::{ChunkRow, Document, DocumentStatus, MetaDb};
use crate::providers::ProviderRegistry;
use crate::store::{ChunkPayload, ChunkPoint, QdrantStore};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-ingest knobs from the CLI
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Preferred extraction provider, tried first
    pub extraction_provider: Option<String>,
    /// Preferred embedding provider, tried first
    pub embedding_provider: Option<String>,
    /// Extract and chunk only; the document stays pending
    pub skip_embeddings: bool,
}

/// Outcome of one ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub filename: String,
    pub status: String,
    pub chunk_count: usize,
    pub extraction_provider: String,
    pub embedding_provider: Option<String>,
    pub warning: Option<String>,
    /// True when the content hash matched an existing document and nothing
    /// was re-processed
    pub deduplicated: bool,
    pub processing_time_ms: u64,
}

/// Ingest a local file
pub async fn cmd_ingest_file(
    config: &Config,
    db: &MetaDb,
    registry: &ProviderRegistry,
    path: &Path,
    options: IngestOptions,
) -> Result<IngestReport> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let content_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string();

    let source = DocumentSource::Bytes {
        bytes,
        content_type: content_type.clone(),
    };
    ingest_document(config, db, registry, source, filename, content_type, None, options).await
}

/// Ingest a web page by URL
pub async fn cmd_ingest_url(
    config: &Config,
    db: &MetaDb,
    registry: &ProviderRegistry,
    url: &str,
    options: IngestOptions,
) -> Result<IngestReport> {
    let parsed = url::Url::parse(url)?;
    let filename = parsed
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| parsed.host_str().unwrap_or(url))
        .to_string();

    let source = DocumentSource::Url(url.to_string());
    ingest_document(
        config,
        db,
        registry,
        source,
        filename,
        "text/html".to_string(),
        Some(url.to_string()),
        options,
    )
    .await
}

/// Ingest raw text from the command line or stdin
pub async fn cmd_ingest_text(
    config: &Config,
    db: &MetaDb,
    registry: &ProviderRegistry,
    text: &str,
    name: Option<String>,
    options: IngestOptions,
) -> Result<IngestReport> {
    let filename = name.unwrap_or_else(|| "inline-text".to_string());
    let source = DocumentSource::Bytes {
        bytes: text.as_bytes().to_vec(),
        content_type: "text/plain".to_string(),
    };
    ingest_document(
        config,
        db,
        registry,
        source,
        filename,
        "text/plain".to_string(),
        None,
        options,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn ingest_document(
    config: &Config,
    db: &MetaDb,
    registry: &ProviderRegistry,
    source: DocumentSource,
    filename: String,
    content_type: String,
    source_url: Option<String>,
    options: IngestOptions,
) -> Result<IngestReport> {
    let start = Instant::now();

    let content_hash = match &source {
        DocumentSource::Bytes { bytes, .. } => blake3::hash(bytes).to_hex().to_string(),
        DocumentSource::Url(url) => blake3::hash(url.as_bytes()).to_hex().to_string(),
    };

    // Re-ingesting identical, fully indexed content is a no-op. A pending
    // or incomplete match means an earlier run never confirmed its vectors;
    // re-running the pipeline is the repair path.
    let mut reuse_document_id = None;
    if let Some(existing) = db.get_document_by_hash(&content_hash).await? {
        if existing.get_status()? == DocumentStatus::Complete {
            info!(
                document_id = %existing.id,
                filename = %existing.filename,
                "Content already ingested, skipping"
            );
            return Ok(IngestReport {
                document_id: existing.id,
                filename: existing.filename,
                status: existing.status,
                chunk_count: existing.chunk_count as usize,
                extraction_provider: existing.extraction_provider,
                embedding_provider: existing.embedding_provider,
                warning: existing.warning,
                deduplicated: true,
                processing_time_ms: start.elapsed().as_millis() as u64,
            });
        }

        warn!(
            document_id = %existing.id,
            status = %existing.status,
            "Unfinished document matches this content, reprocessing"
        );
        clear_stale_document(config, db, &existing).await?;
        // Keeping the document ID keeps the derived point IDs identical,
        // so any vectors the failed run did write get overwritten.
        reuse_document_id = Some(existing.id);
    }

    let extraction = extract_text(registry, &source, options.extraction_provider.as_deref()).await?;
    if let Some(ref w) = extraction.warning {
        warn!(filename = %filename, warning = %w, "Extraction warning");
    }

    let chunks = if extraction.text.trim().is_empty() {
        Vec::new()
    } else {
        chunk_text(&extraction.text, config.chunk.size, config.chunk.overlap)?
    };

    // No text means nothing to embed: the document is still recorded so the
    // warning is visible in `status`.
    if chunks.is_empty() {
        let mut doc = build_document(
            &filename,
            source_url,
            &content_type,
            &content_hash,
            &extraction,
            None,
        )?;
        if let Some(id) = reuse_document_id {
            doc.id = id;
        }
        db.insert_document_with_chunks(&doc, &[]).await?;
        db.set_document_status(&doc.id, DocumentStatus::Complete)
            .await?;

        return Ok(IngestReport {
            document_id: doc.id,
            filename,
            status: DocumentStatus::Complete.to_string(),
            chunk_count: 0,
            extraction_provider: extraction.provider,
            embedding_provider: None,
            warning: extraction.warning,
            deduplicated: false,
            processing_time_ms: start.elapsed().as_millis() as u64,
        });
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    if options.skip_embeddings {
        let mut doc = build_document(
            &filename,
            source_url,
            &content_type,
            &content_hash,
            &extraction,
            None,
        )?;
        if let Some(id) = reuse_document_id {
            doc.id = id;
        }
        let rows: Vec<ChunkRow> = chunks
            .iter()
            .map(|c| {
                ChunkRow::new(
                    doc.id.clone(),
                    c.index as i64,
                    c.offset as i64,
                    c.text.clone(),
                    0,
                )
            })
            .collect();
        db.insert_document_with_chunks(&doc, &rows).await?;

        return Ok(IngestReport {
            document_id: doc.id,
            filename,
            status: DocumentStatus::Pending.to_string(),
            chunk_count: rows.len(),
            extraction_provider: extraction.provider,
            embedding_provider: None,
            warning: extraction.warning,
            deduplicated: false,
            processing_time_ms: start.elapsed().as_millis() as u64,
        });
    }

    let batch = embed_chunks(
        registry,
        &texts,
        config.embedding.batch_size,
        options.embedding_provider.as_deref(),
    )
    .await?;

    let mut doc = build_document(
        &filename,
        source_url,
        &content_type,
        &content_hash,
        &extraction,
        Some(batch.provider.clone()),
    )?;
    if let Some(id) = reuse_document_id {
        doc.id = id;
    }
    let rows: Vec<ChunkRow> = chunks
        .iter()
        .map(|c| {
            ChunkRow::new(
                doc.id.clone(),
                c.index as i64,
                c.offset as i64,
                c.text.clone(),
                batch.dimension as i64,
            )
        })
        .collect();

    db.insert_document_with_chunks(&doc, &rows).await?;

    let store = QdrantStore::connect(config, batch.dimension).await?;
    store.ensure_collection().await?;

    let points = rows
        .iter()
        .zip(batch.vectors.iter())
        .map(|(row, vector)| {
            let id = Uuid::parse_str(&row.point_id)
                .map_err(|e| Error::Integrity(format!("Bad point id {}: {}", row.point_id, e)))?;
            Ok(ChunkPoint {
                id,
                vector: vector.clone(),
                payload: ChunkPayload::new(
                    doc.id.clone(),
                    doc.filename.clone(),
                    row.chunk_index,
                    batch.provider.clone(),
                    row.created_at.clone(),
                ),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Err(e) = store.upsert_points(points).await {
        db.set_document_status(&doc.id, DocumentStatus::Incomplete)
            .await?;
        return Err(e);
    }

    db.set_document_status(&doc.id, DocumentStatus::Complete)
        .await?;

    info!(
        document_id = %doc.id,
        filename = %doc.filename,
        chunks = rows.len(),
        embedding_provider = %batch.provider,
        "Document ingested"
    );

    Ok(IngestReport {
        document_id: doc.id,
        filename,
        status: DocumentStatus::Complete.to_string(),
        chunk_count: rows.len(),
        extraction_provider: extraction.provider,
        embedding_provider: Some(batch.provider),
        warning: extraction.warning,
        deduplicated: false,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

/// Remove the rows (and any stray vectors) of a document whose ingestion
/// never completed, so the pipeline can run again from scratch.
async fn clear_stale_document(config: &Config, db: &MetaDb, existing: &Document) -> Result<()> {
    let had_vectors = db
        .get_chunks(&existing.id)
        .await?
        .iter()
        .any(|c| c.embedding_dim > 0);
    let point_ids = db.delete_document(&existing.id).await?;

    if !had_vectors {
        return Ok(());
    }

    // Best effort: the re-run overwrites overlapping point IDs anyway.
    let uuids: Vec<Uuid> = point_ids
        .iter()
        .filter_map(|p| Uuid::parse_str(p).ok())
        .collect();
    match QdrantStore::connect(config, 0).await {
        Ok(store) => {
            if let Err(e) = store.delete_points(&uuids).await {
                warn!(document_id = %existing.id, "Could not delete stale points: {}", e);
            }
        }
        Err(e) => {
            warn!(document_id = %existing.id, "Vector store unreachable during cleanup: {}", e);
        }
    }
    Ok(())
}

fn build_document(
    filename: &str,
    source_url: Option<String>,
    content_type: &str,
    content_hash: &str,
    extraction: &Extraction,
    embedding_provider: Option<String>,
) -> Result<Document> {
    let mut doc = Document::new(
        filename.to_string(),
        source_url,
        content_type.to_string(),
        content_hash.to_string(),
        extraction.provider.clone(),
        embedding_provider,
    );
    doc.warning = extraction.warning.clone();
    if !extraction.metadata.is_null() {
        doc.metadata_json = Some(serde_json::to_string(&extraction.metadata)?);
    }
    Ok(doc)
}

/// Human-readable ingest summary
pub fn print_ingest_report(report: &IngestReport) {
    if report.deduplicated {
        println!(
            "✓ Already ingested as document {} ({} chunks)",
            report.document_id, report.chunk_count
        );
        return;
    }

    println!("✓ Ingested '{}'", report.filename);
    println!("  Document ID: {}", report.document_id);
    println!("  Chunks: {}", report.chunk_count);
    println!("  Extraction: {}", report.extraction_provider);
    if let Some(ref provider) = report.embedding_provider {
        println!("  Embedding: {}", provider);
    }
    println!("  Time: {}ms", report.processing_time_ms);
    if let Some(ref warning) = report.warning {
        println!("  ⚠ {}", warning);
    }
}
