//! Default values for configuration

use std::collections::HashMap;

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default collection name
pub fn default_collection_name() -> String {
    "docquery_chunks".to_string()
}

/// Default provider endpoints for a local deployment.
///
/// The OCR sidecar services listen on consecutive ports; hosted providers
/// point at their public APIs and only become candidates once their
/// credential env var is set.
pub fn default_provider_endpoints() -> HashMap<String, String> {
    let mut endpoints = HashMap::new();
    endpoints.insert(
        "paddleocr".to_string(),
        env_or("DOCQUERY_PADDLEOCR_URL", "http://127.0.0.1:8155"),
    );
    endpoints.insert(
        "easyocr".to_string(),
        env_or("DOCQUERY_EASYOCR_URL", "http://127.0.0.1:8156"),
    );
    endpoints.insert(
        "crawl4ai".to_string(),
        env_or("DOCQUERY_CRAWL4AI_URL", "http://127.0.0.1:8157"),
    );
    endpoints.insert(
        "deepseek-ocr".to_string(),
        env_or("DOCQUERY_DEEPSEEK_OCR_URL", "https://api.deepseek.com/ocr"),
    );
    endpoints.insert(
        "dots-ocr".to_string(),
        env_or("DOCQUERY_DOTS_OCR_URL", "https://api.dots-ocr.com"),
    );
    endpoints.insert(
        "local-embed".to_string(),
        env_or("DOCQUERY_EMBED_URL", "http://127.0.0.1:7997"),
    );
    endpoints.insert(
        "openai-embed".to_string(),
        env_or("DOCQUERY_OPENAI_URL", "https://api.openai.com"),
    );
    endpoints.insert(
        "ollama".to_string(),
        env_or("DOCQUERY_OLLAMA_URL", "http://127.0.0.1:11434"),
    );
    endpoints.insert(
        "openai-chat".to_string(),
        env_or("DOCQUERY_OPENAI_URL", "https://api.openai.com"),
    );
    endpoints
}

fn env_or(var: &str, fallback: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| fallback.to_string())
}

/// Default characters per chunk window
pub fn default_chunk_size() -> usize {
    1000
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    200
}

/// Default embedding provider
pub fn default_embedding_provider() -> String {
    "local-embed".to_string()
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default number of chunks retrieved per question
pub fn default_query_top_k() -> usize {
    5
}

/// Default maximum query results
pub fn default_query_max_results() -> usize {
    50
}

/// Default minimum similarity score
pub fn default_similarity_threshold() -> f32 {
    0.3
}
