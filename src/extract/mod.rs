//! Text extraction stage
//!
//! Converts a raw document into plain text via the fallback orchestrator
//! over recognition providers. Plain text bypasses providers entirely; a
//! provider that runs but finds no text is a success with a warning, never
//! a failure.

mod http_service;

pub use http_service::*;

use crate::error::{Error, Result};
use crate::providers::{run_with_fallback, DocumentFormat, ProviderRegistry};
use tracing::{debug, info};

/// Raw document handed to the ingestion pipeline
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Bytes {
        bytes: Vec<u8>,
        content_type: String,
    },
    Url(String),
}

impl DocumentSource {
    pub fn format(&self) -> Result<DocumentFormat> {
        match self {
            DocumentSource::Bytes { content_type, .. } => {
                DocumentFormat::from_content_type(content_type)
            }
            DocumentSource::Url(_) => Ok(DocumentFormat::Url),
        }
    }
}

/// Output of the extraction stage
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub confidence: f32,
    /// Provider that produced the text; "plain-text" for the bypass
    pub provider: String,
    /// Non-fatal condition the caller should surface (e.g. empty text)
    pub warning: Option<String>,
    /// Provider-specific extraction stats
    pub metadata: serde_json::Value,
}

pub const PLAIN_TEXT_PROVIDER: &str = "plain-text";

/// Run the extraction stage for one document
pub async fn extract_text(
    registry: &ProviderRegistry,
    source: &DocumentSource,
    provider_hint: Option<&str>,
) -> Result<Extraction> {
    let format = source.format()?;

    // The web extractor works from an address, not a body; there is no
    // recognition route for HTML handed over as bytes.
    if format == DocumentFormat::Html {
        if let DocumentSource::Bytes { content_type, .. } = source {
            return Err(Error::UnsupportedContentType(format!(
                "{} (ingest web pages by URL)",
                content_type
            )));
        }
    }

    // Plain text never touches a recognition provider: direct decode keeps
    // byte-for-byte fidelity and skips the call entirely.
    if format.is_plain_text() {
        if let DocumentSource::Bytes { bytes, .. } = source {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| Error::Extraction(format!("Invalid UTF-8 in plain text: {}", e)))?
                .to_string();
            debug!(chars = text.len(), "Plain-text bypass, no provider invoked");
            return Ok(with_empty_warning(Extraction {
                text,
                confidence: 1.0,
                provider: PLAIN_TEXT_PROVIDER.to_string(),
                warning: None,
                metadata: serde_json::json!({}),
            }));
        }
    }

    let candidates = registry.extraction_candidates(format, provider_hint);

    let outcome = run_with_fallback("extraction", &candidates, |spec| {
        let endpoint = registry.endpoint(spec.id).map(str::to_string);
        let credential = spec.credential();
        async move {
            let endpoint = endpoint
                .ok_or_else(|| Error::Config(format!("No endpoint for provider {}", spec.id)))?;
            let client = RecognitionClient::new(&endpoint, credential, spec.timeout)?;
            match source {
                DocumentSource::Bytes {
                    bytes,
                    content_type,
                } => client.extract(bytes, content_type).await,
                DocumentSource::Url(url) => client.crawl(url).await,
            }
        }
    })
    .await?;

    let service = outcome.value;
    info!(
        provider = %outcome.provider,
        chars = service.text.len(),
        "Extraction complete"
    );

    Ok(with_empty_warning(Extraction {
        text: service.text,
        confidence: service.confidence.unwrap_or(1.0),
        provider: outcome.provider,
        warning: None,
        metadata: service.metadata,
    }))
}

/// A successful extraction with no text is a warning, not an error; the
/// pipeline continues and the caller decides what to do with an empty
/// document.
fn with_empty_warning(mut extraction: Extraction) -> Extraction {
    if extraction.text.trim().is_empty() && extraction.warning.is_none() {
        extraction.warning = Some("extraction produced no text".to_string());
    }
    extraction
}
