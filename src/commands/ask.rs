//! Ask command implementation
//!
//! Retrieval plus answer synthesis. A metadata filter that matches no
//! stored document is an explicit error, never a silent fallback to an
//! unfiltered search; an empty retrieval produces the fixed no-context
//! answer without calling a generation provider. Every question is
//! appended to the query log either way.

use crate::config::Config;
use crate::embed::embed_question;
use crate::error::{Error, Result};
use crate::generate::{synthesize_answer, Answer, ContextChunk};
use crate::meta::{MetaDb, QueryLogEntry};
use crate::providers::ProviderRegistry;
use crate::store::{QdrantStore, SearchFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-question knobs from the CLI
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Number of chunks to retrieve (defaults to config)
    pub top_k: Option<usize>,
    /// Restrict retrieval to one document by filename
    pub filename: Option<String>,
    /// Restrict retrieval to one document by ID
    pub document_id: Option<String>,
    /// Preferred generation provider, tried first
    pub generation_provider: Option<String>,
}

/// One chunk that backed the answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub filename: String,
    pub chunk_index: i64,
    pub score: f32,
    pub text: String,
}

/// Outcome of one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskReport {
    pub question: String,
    pub answer: String,
    pub answer_provider: Option<String>,
    pub model: Option<String>,
    pub retrieved: Vec<RetrievedChunk>,
    pub duration_ms: u64,
}

/// Answer a question against the ingested corpus
pub async fn cmd_ask(
    config: &Config,
    db: &MetaDb,
    registry: &ProviderRegistry,
    question: &str,
    options: AskOptions,
) -> Result<AskReport> {
    let start = Instant::now();

    let top_k = options
        .top_k
        .unwrap_or(config.query.top_k)
        .min(config.query.max_results);

    // Resolve the filter against metadata before touching the vector
    // store, and pin the embedding provider so the question vector is
    // comparable with the stored ones.
    let (filter, embedding_provider) = resolve_filter(config, db, &options).await?;

    let spec = registry.embedder_for_document(&embedding_provider)?;
    let query_vector = embed_question(registry, spec, question).await?;

    let dimension = query_vector.len();
    let store = QdrantStore::connect(config, dimension).await?;
    store.check_collection_dimension().await?;
    let hits = store
        .search(
            query_vector,
            top_k,
            config.query.similarity_threshold,
            Some(filter),
        )
        .await?;

    debug!(hits = hits.len(), top_k, "Vector search complete");

    // Map hits back to stored chunk text, preserving score order. Points
    // whose documents are not complete drop out here.
    let point_ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
    let rows = db.get_chunks_by_point_ids(&point_ids).await?;
    let by_point: HashMap<&str, &crate::meta::ChunkRow> =
        rows.iter().map(|r| (r.point_id.as_str(), r)).collect();

    let mut retrieved = Vec::new();
    let mut contexts = Vec::new();
    let mut sources = Vec::new();
    for hit in &hits {
        if let Some(row) = by_point.get(hit.id.as_str()) {
            retrieved.push(RetrievedChunk {
                filename: hit.payload.filename.clone(),
                chunk_index: row.chunk_index,
                score: hit.score,
                text: row.chunk_text.clone(),
            });
            contexts.push(ContextChunk {
                text: row.chunk_text.clone(),
                filename: hit.payload.filename.clone(),
                chunk_index: row.chunk_index as usize,
                score: hit.score,
            });
            sources.push(serde_json::json!({
                "chunk_id": row.id,
                "score": hit.score,
            }));
        }
    }

    let answer: Answer = synthesize_answer(
        registry,
        question,
        &contexts,
        options.generation_provider.as_deref(),
    )
    .await?;

    let duration_ms = start.elapsed().as_millis() as u64;

    // The query log is observability only; losing a row must not turn a
    // successful answer into an error.
    let filter_json = filter_description(&options);
    let sources_json = if sources.is_empty() {
        None
    } else {
        Some(serde_json::Value::Array(sources).to_string())
    };
    if let Err(e) = db
        .insert_query_log(&QueryLogEntry::new(
            question.to_string(),
            answer.text.clone(),
            filter_json,
            sources_json,
            top_k as i64,
            retrieved.len() as i64,
            answer.provider.clone(),
            answer.model.clone(),
            duration_ms as i64,
        ))
        .await
    {
        warn!("Failed to write query log entry: {}", e);
    }

    info!(
        results = retrieved.len(),
        provider = answer.provider.as_deref().unwrap_or("none"),
        duration_ms,
        "Question answered"
    );

    Ok(AskReport {
        question: question.to_string(),
        answer: answer.text,
        answer_provider: answer.provider,
        model: answer.model,
        retrieved,
        duration_ms,
    })
}

/// Build the search filter, failing fast when it cannot match anything.
async fn resolve_filter(
    config: &Config,
    db: &MetaDb,
    options: &AskOptions,
) -> Result<(SearchFilter, String)> {
    if let Some(ref document_id) = options.document_id {
        let doc = db
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::FilterMismatch(format!("no document with id '{}'", document_id)))?;
        let provider = doc.embedding_provider.ok_or_else(|| {
            Error::FilterMismatch(format!("document '{}' has no embeddings", document_id))
        })?;
        return Ok((
            SearchFilter {
                document_id: Some(document_id.clone()),
                ..Default::default()
            },
            provider,
        ));
    }

    if let Some(ref filename) = options.filename {
        let docs = db.get_documents_by_filename(filename).await?;
        if docs.is_empty() {
            return Err(Error::FilterMismatch(format!(
                "no document named '{}'",
                filename
            )));
        }

        // The question must be embedded by the same model as the stored
        // vectors, so the filter routes to the documents' recorded
        // provider rather than the configured default.
        let mut providers: Vec<String> = docs
            .into_iter()
            .filter_map(|d| d.embedding_provider)
            .collect();
        providers.sort();
        providers.dedup();

        return match providers.len() {
            0 => Err(Error::FilterMismatch(format!(
                "no embedded document named '{}'",
                filename
            ))),
            1 => {
                let provider = providers.remove(0);
                Ok((
                    SearchFilter {
                        filename: Some(filename.clone()),
                        embedding_provider: Some(provider.clone()),
                        ..Default::default()
                    },
                    provider,
                ))
            }
            _ => Err(Error::Config(format!(
                "documents named '{}' were embedded by different providers ({}); \
                 query by document id instead",
                filename,
                providers.join(", ")
            ))),
        };
    }

    Ok((
        SearchFilter {
            embedding_provider: Some(config.embedding.default_provider.clone()),
            ..Default::default()
        },
        config.embedding.default_provider.clone(),
    ))
}

fn filter_description(options: &AskOptions) -> Option<String> {
    let mut map = serde_json::Map::new();
    if let Some(ref id) = options.document_id {
        map.insert("document_id".to_string(), serde_json::json!(id));
    }
    if let Some(ref name) = options.filename {
        map.insert("filename".to_string(), serde_json::json!(name));
    }
    if map.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(map).to_string())
    }
}

/// Human-readable answer output
pub fn print_ask_report(report: &AskReport) {
    println!("{}\n", report.answer);

    if !report.retrieved.is_empty() {
        println!("Sources:");
        for (i, chunk) in report.retrieved.iter().enumerate() {
            println!(
                "  [{}] {} (chunk {}, score {:.3})",
                i + 1,
                chunk.filename,
                chunk.chunk_index,
                chunk.score
            );
        }
    }
    println!("\n({}ms)", report.duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Document;
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn setup() -> (Config, MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let db = MetaDb::connect(&config).await.unwrap();
        (config, db, tmp)
    }

    #[tokio::test]
    async fn test_unknown_filename_is_filter_mismatch() {
        let (config, db, _tmp) = setup().await;
        let registry = ProviderRegistry::with_endpoints(HashMap::new());

        let options = AskOptions {
            filename: Some("nonexistent.pdf".to_string()),
            ..Default::default()
        };
        let err = cmd_ask(&config, &db, &registry, "anything?", options)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FilterMismatch(_)));
        assert!(err.to_string().contains("nonexistent.pdf"));
    }

    #[tokio::test]
    async fn test_unknown_document_id_is_filter_mismatch() {
        let (config, db, _tmp) = setup().await;
        let registry = ProviderRegistry::with_endpoints(HashMap::new());

        let options = AskOptions {
            document_id: Some("no-such-id".to_string()),
            ..Default::default()
        };
        let err = cmd_ask(&config, &db, &registry, "anything?", options)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FilterMismatch(_)));
    }

    fn document(filename: &str, hash: &str, provider: Option<&str>) -> Document {
        Document::new(
            filename.to_string(),
            None,
            "application/pdf".to_string(),
            hash.to_string(),
            "paddleocr".to_string(),
            provider.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_filename_filter_uses_stored_embedding_provider() {
        let (config, db, _tmp) = setup().await;
        let doc = document("paper.pdf", "h1", Some("openai-embed"));
        db.insert_document_with_chunks(&doc, &[]).await.unwrap();

        let options = AskOptions {
            filename: Some("paper.pdf".to_string()),
            ..Default::default()
        };
        let (filter, provider) = resolve_filter(&config, &db, &options).await.unwrap();

        assert_eq!(provider, "openai-embed");
        assert_eq!(filter.embedding_provider.as_deref(), Some("openai-embed"));
        assert_eq!(filter.filename.as_deref(), Some("paper.pdf"));
    }

    #[tokio::test]
    async fn test_filename_with_mixed_providers_is_rejected() {
        let (config, db, _tmp) = setup().await;
        let a = document("paper.pdf", "h1", Some("local-embed"));
        let b = document("paper.pdf", "h2", Some("openai-embed"));
        db.insert_document_with_chunks(&a, &[]).await.unwrap();
        db.insert_document_with_chunks(&b, &[]).await.unwrap();

        let options = AskOptions {
            filename: Some("paper.pdf".to_string()),
            ..Default::default()
        };
        let err = resolve_filter(&config, &db, &options).await.unwrap_err();

        match err {
            Error::Config(message) => {
                assert!(message.contains("local-embed"));
                assert!(message.contains("openai-embed"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_filename_without_embeddings_is_filter_mismatch() {
        let (config, db, _tmp) = setup().await;
        let doc = document("draft.pdf", "h1", None);
        db.insert_document_with_chunks(&doc, &[]).await.unwrap();

        let options = AskOptions {
            filename: Some("draft.pdf".to_string()),
            ..Default::default()
        };
        let err = resolve_filter(&config, &db, &options).await.unwrap_err();
        assert!(matches!(err, Error::FilterMismatch(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_default_embedder_is_config_error() {
        let (config, db, _tmp) = setup().await;
        // Registry with no endpoints: the default embedding provider is
        // known but unavailable.
        let registry = ProviderRegistry::with_endpoints(HashMap::new());

        let err = cmd_ask(&config, &db, &registry, "anything?", Default::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }
}
