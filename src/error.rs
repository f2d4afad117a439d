//! Custom error types for docquery
//!
//! Propagation policy: `Config` and `FilterMismatch` are user-actionable and
//! returned verbatim. Individual provider failures are absorbed by the
//! fallback orchestrator and only surface as `ProvidersExhausted`, which
//! carries the full attempt history for operator diagnosis while the
//! user-facing message stays free of credentials and vendor detail.

use thiserror::Error;

/// One failed provider invocation, recorded by the fallback orchestrator.
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    pub provider: String,
    pub reason: String,
}

impl std::fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Main error type for docquery operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All {operation} providers failed ({} attempted)", attempts.len())]
    ProvidersExhausted {
        operation: String,
        attempts: Vec<ProviderAttempt>,
    },

    #[error("Filter matched no documents: {0}")]
    FilterMismatch(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Not initialized: run 'docquery init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Per-provider failure detail for `ProvidersExhausted`, for logs only.
    pub fn attempt_history(&self) -> Option<String> {
        match self {
            Error::ProvidersExhausted { attempts, .. } => Some(
                attempts
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for docquery
pub type Result<T> = std::result::Result<T, Error>;

/// Convert qdrant errors
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::Qdrant(err.to_string())
    }
}
