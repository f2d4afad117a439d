//! HTTP embedding backend
//!
//! Talks to embedding services over `POST /v1/embed/text`. The response
//! shape varies between services (local servers return `embeddings`,
//! OpenAI-compatible ones return `data[].embedding`), so parsing accepts
//! the known variants. Dimensions are validated against the provider's
//! declared output size before anything leaves this module.

use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::providers::ProviderSpec;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest {
    model: String,
    inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

/// Embedder backed by an HTTP embedding service
pub struct HttpEmbedder {
    client: Client,
    base_url: Url,
    model: String,
    dimension: usize,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, spec: &ProviderSpec) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let model = spec
            .model
            .ok_or_else(|| Error::Config(format!("Provider {} declares no model", spec.id)))?
            .to_string();
        let dimension = spec
            .dimension
            .ok_or_else(|| Error::Config(format!("Provider {} declares no dimension", spec.id)))?;
        let client = Client::builder().timeout(spec.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            model,
            dimension,
            api_key: spec.credential(),
        })
    }

    fn endpoint(&self) -> Result<Url> {
        self.base_url
            .join("/v1/embed/text")
            .map_err(|e| Error::Config(format!("Invalid embedding service URL: {}", e)))
    }

    fn validate_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        for vector in embeddings {
            if vector.len() != self.dimension {
                return Err(Error::Embedding(format!(
                    "Model {} returned {}-dimensional vector, expected {}",
                    self.model,
                    vector.len(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint()?;
        let body = EmbedTextRequest {
            model: self.model.clone(),
            inputs: texts,
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Malformed embedding response: {}", e)))?;

        let embeddings = parsed.into_embeddings();
        self.validate_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DocumentFormat, ProviderKind, Tier};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec(dimension: usize) -> ProviderSpec {
        ProviderSpec {
            id: "local-embed",
            kind: ProviderKind::Embedding,
            tier: Tier::Free,
            supported_formats: &[DocumentFormat::PlainText],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: Duration::from_secs(5),
            model: Some("BAAI/bge-small-en-v1.5"),
            dimension: Some(dimension),
        }
    }

    #[tokio::test]
    async fn test_embeddings_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .and(body_partial_json(
                serde_json::json!({"model": "BAAI/bge-small-en-v1.5"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2, 0.3]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&server.uri(), &spec(3)).unwrap();
        let vectors = embedder.embed(vec!["hello".to_string()]).await.unwrap();

        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[tokio::test]
    async fn test_openai_data_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 2.0]}, {"embedding": [3.0, 4.0]}]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&server.uri(), &spec(2)).unwrap();
        let vectors = embedder
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&server.uri(), &spec(384)).unwrap();
        let err = embedder.embed(vec!["hello".to_string()]).await.unwrap_err();

        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.to_string().contains("384"));
    }
}
