//! SQLite schema definition

/// SQL schema for the metadata database
pub const SCHEMA_SQL: &str = r#"
-- Documents: one row per ingested document
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    source_url TEXT,
    content_type TEXT NOT NULL,
    content_hash TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    extraction_provider TEXT NOT NULL,
    embedding_provider TEXT,
    warning TEXT,
    metadata_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Chunks: the text behind each vector point
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id),
    chunk_index INTEGER NOT NULL,
    chunk_offset INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    embedding_dim INTEGER NOT NULL,
    point_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(document_id, chunk_index)
);

-- Query log: every question asked, for auditing
CREATE TABLE IF NOT EXISTS query_log (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    filter_json TEXT,
    sources_json TEXT,
    top_k INTEGER NOT NULL,
    result_count INTEGER NOT NULL,
    answer_provider TEXT,
    model TEXT,
    duration_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);
CREATE INDEX IF NOT EXISTS idx_documents_filename ON documents(filename);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
CREATE INDEX IF NOT EXISTS idx_chunks_point ON chunks(point_id);
CREATE INDEX IF NOT EXISTS idx_query_log_created ON query_log(created_at);
"#;
