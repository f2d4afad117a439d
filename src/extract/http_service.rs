//! HTTP client for recognition services
//!
//! All recognition providers expose the same two operations: `POST /extract`
//! with base64 document bytes, and `POST /crawl` with a URL for web-capable
//! providers. Failures are signalled by status or transport errors; a 200
//! with empty text is a legitimate zero-result response.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct ExtractRequest<'a> {
    document_base64: String,
    content_type: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
}

/// Response shape shared by the recognition services
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceExtraction {
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

pub struct RecognitionClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RecognitionClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid recognition service URL: {}", e)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ServiceExtraction> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Extraction(e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| Error::Extraction(e.to_string()))?;
        response
            .json::<ServiceExtraction>()
            .await
            .map_err(|e| Error::Extraction(format!("Malformed service response: {}", e)))
    }

    /// Extract text from raw document bytes
    pub async fn extract(&self, bytes: &[u8], content_type: &str) -> Result<ServiceExtraction> {
        let url = self.endpoint("/extract")?;
        let body = ExtractRequest {
            document_base64: STANDARD.encode(bytes),
            content_type,
        };
        self.send(self.client.post(url).json(&body)).await
    }

    /// Extract text from a web page
    pub async fn crawl(&self, page_url: &str) -> Result<ServiceExtraction> {
        let url = self.endpoint("/crawl")?;
        let body = CrawlRequest { url: page_url };
        self.send(self.client.post(url).json(&body)).await
    }
}
