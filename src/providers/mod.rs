//! Provider registry
//!
//! Static catalog of recognition, embedding and generation providers with
//! capability metadata. Selection is a computed priority list: capability
//! match first, then tier and per-unit cost. Availability additionally
//! requires a configured endpoint and, for credentialed providers, the
//! credential env var to be present.

mod fallback;

pub use fallback::*;

use crate::config::Config;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Operation a provider implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Extraction,
    Embedding,
    Generation,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Extraction => write!(f, "extraction"),
            ProviderKind::Embedding => write!(f, "embedding"),
            ProviderKind::Generation => write!(f, "generation"),
        }
    }
}

/// Pricing tier, used as the primary fallback ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Free,
    Standard,
    Premium,
}

/// Input formats the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Image,
    Html,
    Url,
}

impl DocumentFormat {
    /// Map a declared content type onto a pipeline format
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let base = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "text/plain" | "text/markdown" | "text/csv" => Ok(DocumentFormat::PlainText),
            "application/pdf" => Ok(DocumentFormat::Pdf),
            "text/html" | "application/xhtml+xml" => Ok(DocumentFormat::Html),
            "text/uri-list" => Ok(DocumentFormat::Url),
            _ if base.starts_with("image/") => Ok(DocumentFormat::Image),
            _ => Err(Error::UnsupportedContentType(content_type.to_string())),
        }
    }

    /// Whether extraction is a no-op direct decode for this format
    pub fn is_plain_text(&self) -> bool {
        matches!(self, DocumentFormat::PlainText)
    }
}

/// Capability metadata for one provider
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub id: &'static str,
    pub kind: ProviderKind,
    pub tier: Tier,
    pub supported_formats: &'static [DocumentFormat],
    pub requires_credential: bool,
    pub credential_env: Option<&'static str>,
    /// USD per page (extraction) or per 1k tokens (embedding/generation)
    pub cost_per_unit: f64,
    pub timeout: Duration,
    /// Model identifier sent to the backing service, when it takes one
    pub model: Option<&'static str>,
    /// Output dimensionality, embedding providers only
    pub dimension: Option<usize>,
}

impl ProviderSpec {
    /// Format-capability check only; says nothing about availability
    pub fn can_handle(&self, format: DocumentFormat) -> bool {
        self.supported_formats.contains(&format)
    }

    /// Whether the required credential is present in the environment
    pub fn credential_available(&self) -> bool {
        if !self.requires_credential {
            return true;
        }
        self.credential_env
            .map(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Read the credential, if this provider uses one
    pub fn credential(&self) -> Option<String> {
        self.credential_env
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty())
    }
}

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// The built-in provider catalog
fn builtin_specs() -> Vec<ProviderSpec> {
    use DocumentFormat::*;
    vec![
        ProviderSpec {
            id: "paddleocr",
            kind: ProviderKind::Extraction,
            tier: Tier::Free,
            supported_formats: &[Pdf, Image],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            model: None,
            dimension: None,
        },
        ProviderSpec {
            id: "easyocr",
            kind: ProviderKind::Extraction,
            tier: Tier::Free,
            supported_formats: &[Image],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            model: None,
            dimension: None,
        },
        ProviderSpec {
            id: "deepseek-ocr",
            kind: ProviderKind::Extraction,
            tier: Tier::Standard,
            supported_formats: &[Pdf, Image],
            requires_credential: true,
            credential_env: Some("DEEPSEEK_OCR_API_KEY"),
            cost_per_unit: 0.001,
            timeout: Duration::from_secs(60),
            model: None,
            dimension: None,
        },
        ProviderSpec {
            id: "dots-ocr",
            kind: ProviderKind::Extraction,
            tier: Tier::Premium,
            supported_formats: &[Pdf, Image],
            requires_credential: true,
            credential_env: Some("DOTS_OCR_API_KEY"),
            cost_per_unit: 0.003,
            timeout: Duration::from_secs(60),
            model: None,
            dimension: None,
        },
        ProviderSpec {
            id: "crawl4ai",
            kind: ProviderKind::Extraction,
            tier: Tier::Free,
            supported_formats: &[Url],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: Duration::from_secs(45),
            model: None,
            dimension: None,
        },
        ProviderSpec {
            id: "local-embed",
            kind: ProviderKind::Embedding,
            tier: Tier::Free,
            supported_formats: &[PlainText],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            model: Some("BAAI/bge-small-en-v1.5"),
            dimension: Some(384),
        },
        ProviderSpec {
            id: "openai-embed",
            kind: ProviderKind::Embedding,
            tier: Tier::Standard,
            supported_formats: &[PlainText],
            requires_credential: true,
            credential_env: Some("OPENAI_API_KEY"),
            cost_per_unit: 0.00002,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            model: Some("text-embedding-3-small"),
            dimension: Some(1536),
        },
        ProviderSpec {
            id: "ollama",
            kind: ProviderKind::Generation,
            tier: Tier::Free,
            supported_formats: &[PlainText],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: Duration::from_secs(90),
            model: Some("llama3.1"),
            dimension: None,
        },
        ProviderSpec {
            id: "openai-chat",
            kind: ProviderKind::Generation,
            tier: Tier::Standard,
            supported_formats: &[PlainText],
            requires_credential: true,
            credential_env: Some("OPENAI_API_KEY"),
            cost_per_unit: 0.0006,
            timeout: Duration::from_secs(60),
            model: Some("gpt-4o-mini"),
            dimension: None,
        },
    ]
}

/// Provider catalog plus the endpoints configured for this installation
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    specs: Vec<ProviderSpec>,
    endpoints: HashMap<String, String>,
}

impl ProviderRegistry {
    /// Build the registry from config (endpoints come from `[providers]`)
    pub fn from_config(config: &Config) -> Self {
        Self {
            specs: builtin_specs(),
            endpoints: config.providers.endpoints(),
        }
    }

    #[cfg(test)]
    pub fn with_endpoints(endpoints: HashMap<String, String>) -> Self {
        Self {
            specs: builtin_specs(),
            endpoints,
        }
    }

    /// Look up a provider by id
    pub fn get(&self, id: &str) -> Option<&ProviderSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    /// Endpoint URL for a provider, if configured
    pub fn endpoint(&self, id: &str) -> Option<&str> {
        self.endpoints.get(id).map(|s| s.as_str())
    }

    fn available(&self, spec: &ProviderSpec) -> bool {
        self.endpoints.contains_key(spec.id) && spec.credential_available()
    }

    /// Ordered extraction candidates for an input format.
    ///
    /// A hint promotes the named provider to the front but never adds a
    /// provider that cannot handle the format.
    pub fn extraction_candidates(
        &self,
        format: DocumentFormat,
        hint: Option<&str>,
    ) -> Vec<&ProviderSpec> {
        self.candidates(ProviderKind::Extraction, Some(format), hint)
    }

    /// Ordered embedding candidates
    pub fn embedding_candidates(&self, hint: Option<&str>) -> Vec<&ProviderSpec> {
        self.candidates(ProviderKind::Embedding, None, hint)
    }

    /// Ordered generation candidates
    pub fn generation_candidates(&self, hint: Option<&str>) -> Vec<&ProviderSpec> {
        self.candidates(ProviderKind::Generation, None, hint)
    }

    /// The embedding provider recorded for a stored document. Missing or
    /// unavailable providers are a configuration error: querying against
    /// vectors from one model with a question embedded by another is
    /// meaningless.
    pub fn embedder_for_document(&self, provider_id: &str) -> Result<&ProviderSpec> {
        let spec = self.get(provider_id).ok_or_else(|| {
            Error::Config(format!(
                "Document was embedded with unknown provider '{}'",
                provider_id
            ))
        })?;
        if !self.available(spec) {
            return Err(Error::Config(format!(
                "Embedding provider '{}' is not configured; queries against its documents need it",
                provider_id
            )));
        }
        Ok(spec)
    }

    fn candidates(
        &self,
        kind: ProviderKind,
        format: Option<DocumentFormat>,
        hint: Option<&str>,
    ) -> Vec<&ProviderSpec> {
        let mut matches: Vec<&ProviderSpec> = self
            .specs
            .iter()
            .filter(|s| s.kind == kind)
            .filter(|s| format.map(|f| s.can_handle(f)).unwrap_or(true))
            .filter(|s| self.available(s))
            .collect();

        matches.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then(a.cost_per_unit.partial_cmp(&b.cost_per_unit).unwrap_or(std::cmp::Ordering::Equal))
        });

        if let Some(hint) = hint {
            if let Some(pos) = matches.iter().position(|s| s.id == hint) {
                let preferred = matches.remove(pos);
                matches.insert(0, preferred);
            }
        }

        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(ids: &[&str]) -> ProviderRegistry {
        let endpoints = ids
            .iter()
            .map(|id| (id.to_string(), format!("http://127.0.0.1:9000/{}", id)))
            .collect();
        ProviderRegistry::with_endpoints(endpoints)
    }

    #[test]
    fn test_format_from_content_type() {
        assert_eq!(
            DocumentFormat::from_content_type("text/plain").unwrap(),
            DocumentFormat::PlainText
        );
        assert_eq!(
            DocumentFormat::from_content_type("application/pdf").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_content_type("image/png").unwrap(),
            DocumentFormat::Image
        );
        assert_eq!(
            DocumentFormat::from_content_type("text/plain; charset=utf-8").unwrap(),
            DocumentFormat::PlainText
        );
        assert!(DocumentFormat::from_content_type("application/zip").is_err());
    }

    #[test]
    fn test_extraction_candidates_respect_format() {
        let registry = registry_with(&["paddleocr", "easyocr", "crawl4ai"]);

        let pdf = registry.extraction_candidates(DocumentFormat::Pdf, None);
        assert!(pdf.iter().all(|s| s.can_handle(DocumentFormat::Pdf)));
        assert!(pdf.iter().any(|s| s.id == "paddleocr"));
        assert!(!pdf.iter().any(|s| s.id == "easyocr"));

        let url = registry.extraction_candidates(DocumentFormat::Url, None);
        assert_eq!(url.len(), 1);
        assert_eq!(url[0].id, "crawl4ai");
    }

    #[test]
    fn test_unconfigured_providers_are_excluded() {
        let registry = registry_with(&["paddleocr"]);
        let candidates = registry.extraction_candidates(DocumentFormat::Image, None);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "paddleocr");
    }

    #[test]
    fn test_hint_promotes_provider() {
        let registry = registry_with(&["paddleocr", "easyocr"]);
        let candidates = registry.extraction_candidates(DocumentFormat::Image, Some("easyocr"));
        assert_eq!(candidates[0].id, "easyocr");
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_hint_never_adds_incapable_provider() {
        let registry = registry_with(&["paddleocr", "crawl4ai"]);
        let candidates = registry.extraction_candidates(DocumentFormat::Pdf, Some("crawl4ai"));
        assert!(!candidates.iter().any(|s| s.id == "crawl4ai"));
    }

    #[test]
    fn test_free_tier_sorts_first() {
        let registry = registry_with(&["local-embed", "openai-embed"]);
        let candidates = registry.embedding_candidates(None);
        assert_eq!(candidates[0].id, "local-embed");
    }
}
